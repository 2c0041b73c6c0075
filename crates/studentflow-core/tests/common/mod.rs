#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use polars::prelude::*;

pub const SOURCE_CSV: &str = "\
Nome,Nome do Pai,Nome da Mãe,Data de Nascimento,Idade,Série,Nota Média,Endereço
Ana,Jose Silva,Maria Silva,2010-05-01,99,5,9.5,Rua Augusta 100
Bruno,Pedro Souza,Julia Pereira,2011-07-15,99,4,4.0,Avenida Brasil 20
Carla,Marcos Lima,Rita Lima,2009-01-20,99,6,7.0,Travessa Lima 7
Diego,Rui Costa,Clara Costa,2010-12-31,99,5,9.0,Rua Direita 55
Elisa,Paulo Alves,Lucia Dias,2012-03-03,99,3,4.5,Praca Central 1
Fabio,Joao Rocha,Ana Rocha,2008-08-08,99,7,6.8,Rua Nova 9
";

/// The rows of [`SOURCE_CSV`] as an all-text frame, as `load_raw` produces it.
pub fn source_frame() -> DataFrame {
    df!(
        "Nome" => &["Ana", "Bruno", "Carla", "Diego", "Elisa", "Fabio"],
        "Nome do Pai" => &[
            "Jose Silva", "Pedro Souza", "Marcos Lima", "Rui Costa", "Paulo Alves", "Joao Rocha",
        ],
        "Nome da Mãe" => &[
            "Maria Silva", "Julia Pereira", "Rita Lima", "Clara Costa", "Lucia Dias", "Ana Rocha",
        ],
        "Data de Nascimento" => &[
            "2010-05-01", "2011-07-15", "2009-01-20", "2010-12-31", "2012-03-03", "2008-08-08",
        ],
        "Idade" => &["99", "99", "99", "99", "99", "99"],
        "Série" => &["5", "4", "6", "5", "3", "7"],
        "Nota Média" => &["9.5", "4.0", "7.0", "9.0", "4.5", "6.8"],
        "Endereço" => &[
            "Rua Augusta 100",
            "Avenida Brasil 20",
            "Travessa Lima 7",
            "Rua Direita 55",
            "Praca Central 1",
            "Rua Nova 9",
        ],
    )
    .unwrap()
}

#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub query: HashMap<String, String>,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Clone)]
pub struct FakeRemote {
    pub csv: Option<String>,
    pub index_status: StatusCode,
    pub requests: Arc<Mutex<Vec<IndexRequest>>>,
}

impl FakeRemote {
    pub fn new(csv: Option<&str>, index_status: StatusCode) -> Self {
        Self {
            csv: csv.map(str::to_string),
            index_status,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<IndexRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve_csv(State(remote): State<FakeRemote>) -> Result<String, StatusCode> {
    remote.csv.ok_or(StatusCode::NOT_FOUND)
}

async fn index_update(
    State(remote): State<FakeRemote>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    remote.requests.lock().unwrap().push(IndexRequest {
        query,
        content_type,
        body,
    });
    remote.index_status
}

/// Serve `GET /aluno.csv` and `POST /solr/alunos/update/csv` on an ephemeral port.
pub async fn spawn_remote(remote: FakeRemote) -> SocketAddr {
    let router = Router::new()
        .route("/aluno.csv", get(serve_csv))
        .route("/solr/alunos/update/csv", post(index_update))
        .with_state(remote);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
