mod common;

use axum::http::StatusCode;
use chrono::NaiveDate;
use polars::prelude::*;

use studentflow_core::columns;
use studentflow_core::dates::to_epoch_days;
use studentflow_core::publish::{prepare_for_index, publish_step, to_csv};
use studentflow_core::transform::write_transformed;
use studentflow_core::{build_client, PipelineConfig, PipelineError};

use common::{spawn_remote, FakeRemote};

const HEADER: &str = "Nome Completo,Nome,Serie,Idade,Ano de Nascimento,Data de Nascimento,\
                      Endereco,Rua,Nota Media,Status Geral,id";

fn birth_dates(dates: &[(i32, u32, u32)]) -> Series {
    let days: Vec<i32> = dates
        .iter()
        .map(|&(y, m, d)| to_epoch_days(NaiveDate::from_ymd_opt(y, m, d).unwrap()))
        .collect();
    Series::new(columns::DATA_DE_NASCIMENTO.into(), days)
        .cast(&DataType::Date)
        .unwrap()
}

struct Row {
    full_name: &'static str,
    name: &'static str,
    grade: &'static str,
    age: i64,
    birth_year: i32,
    birth_date: (i32, u32, u32),
    address: &'static str,
    street: &'static str,
    score: f64,
    status: &'static str,
}

const ROWS: [Row; 5] = [
    Row {
        full_name: "Ana Silva",
        name: "Ana",
        grade: "5",
        age: 15,
        birth_year: 2010,
        birth_date: (2010, 5, 1),
        address: "Rua Augusta 100",
        street: "Augusta",
        score: 9.5,
        status: "ótimo",
    },
    Row {
        full_name: "Bruno Souza",
        name: "Bruno",
        grade: "4",
        age: 14,
        birth_year: 2011,
        birth_date: (2011, 7, 15),
        address: "Avenida Brasil 20",
        street: "Brasil",
        score: 4.0,
        status: "regular",
    },
    Row {
        full_name: "Carla Lima",
        name: "Carla",
        grade: "6",
        age: 16,
        birth_year: 2009,
        birth_date: (2009, 1, 20),
        address: "Travessa Lima 7",
        street: "Lima",
        score: 7.0,
        status: "bom",
    },
    Row {
        full_name: "Diego Costa",
        name: "Diego",
        grade: "5",
        age: 14,
        birth_year: 2010,
        birth_date: (2010, 12, 31),
        address: "Rua Direita 55",
        street: "Direita",
        score: 9.0,
        status: "ótimo",
    },
    Row {
        full_name: "Elisa Dias",
        name: "Elisa",
        grade: "3",
        age: 13,
        birth_year: 2012,
        birth_date: (2012, 3, 3),
        address: "Praca Central 1",
        street: "Central",
        score: 4.5,
        status: "regular",
    },
];

fn enriched_frame(rows: usize) -> DataFrame {
    let rows = &ROWS[..rows];
    let texts = |name: &str, field: fn(&Row) -> &'static str| -> Column {
        Series::new(name.into(), rows.iter().map(field).collect::<Vec<_>>()).into()
    };

    DataFrame::new(vec![
        texts(columns::NOME_COMPLETO, |row| row.full_name),
        texts(columns::NOME, |row| row.name),
        texts(columns::SERIE, |row| row.grade),
        Series::new(
            columns::IDADE.into(),
            rows.iter().map(|row| row.age).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            columns::ANO_DE_NASCIMENTO.into(),
            rows.iter().map(|row| row.birth_year).collect::<Vec<_>>(),
        )
        .into(),
        birth_dates(&rows.iter().map(|row| row.birth_date).collect::<Vec<_>>()).into(),
        texts(columns::ENDERECO, |row| row.address),
        texts(columns::RUA, |row| row.street),
        Series::new(
            columns::NOTA_MEDIA.into(),
            rows.iter().map(|row| row.score).collect::<Vec<_>>(),
        )
        .into(),
        texts(columns::STATUS_GERAL, |row| row.status),
    ])
    .unwrap()
}

fn id_column(df: &DataFrame) -> Vec<String> {
    df.column(columns::ID)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|value| value.unwrap().to_string())
        .collect()
}

#[test]
fn cleaning_drops_empty_columns_and_incomplete_rows() -> PolarsResult<()> {
    let mut df = enriched_frame(4);
    df.with_column(Series::new(
        columns::NOME_COMPLETO.into(),
        &[Some("Ana Silva"), None, Some("Carla Lima"), Some("Diego Costa")],
    ))?;
    df.with_column(Series::new(columns::RUA.into(), &["Augusta", "Brasil", "Lima", "  "]))?;
    df.with_column(Series::new("Observacao".into(), &[None::<&str>, None, None, None]))?;

    let cleaned = prepare_for_index(&df).unwrap();

    assert!(cleaned.get_column_index("Observacao").is_none());
    assert_eq!(cleaned.height(), 2);
    assert_eq!(id_column(&cleaned), vec!["0", "2"]);
    for column in cleaned.get_columns() {
        assert_eq!(column.null_count(), 0, "{} has nulls", column.name());
    }

    let dates: Vec<Option<&str>> = cleaned
        .column(columns::DATA_DE_NASCIMENTO)?
        .str()?
        .into_iter()
        .collect();
    assert_eq!(
        dates,
        vec![Some("2010-05-01T00:00:00Z"), Some("2009-01-20T00:00:00Z")]
    );
    Ok(())
}

#[test]
fn sparse_column_is_dropped_instead_of_rows() {
    let mut df = enriched_frame(3);
    df.with_column(Series::new(
        columns::NOME_COMPLETO.into(),
        &[None::<&str>, None, None],
    ))
    .unwrap();

    let cleaned = prepare_for_index(&df).unwrap();
    assert!(cleaned.get_column_index(columns::NOME_COMPLETO).is_none());
    assert_eq!(id_column(&cleaned), vec!["0", "1", "2"]);
}

#[test]
fn nothing_left_after_cleaning_is_an_error() {
    let mut df = enriched_frame(2);
    df.with_column(Series::new(columns::RUA.into(), &[Some("Augusta"), None]))
        .unwrap();
    df.with_column(Series::new(columns::NOTA_MEDIA.into(), &[None, Some(4.0f64)]))
        .unwrap();

    let err = prepare_for_index(&df).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyAfterCleaning));
}

#[test]
fn table_without_any_values_is_an_error() -> PolarsResult<()> {
    let df = df!(
        columns::NOME => &[None::<&str>, None, None],
        columns::RUA => &["  ", "", " "],
    )?;

    let err = prepare_for_index(&df).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyAfterCleaning));
    Ok(())
}

#[test]
fn csv_has_header_and_id_as_last_column() {
    let mut cleaned = prepare_for_index(&enriched_frame(2)).unwrap();
    let csv = to_csv(&mut cleaned).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], HEADER);
    let first: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(first[0], "Ana Silva");
    assert_eq!(first[5], "2010-05-01T00:00:00Z");
    assert_eq!(first[9], "ótimo");
    assert_eq!(first[10], "0");
}

#[tokio::test]
async fn publish_posts_csv_with_commit() {
    let remote = FakeRemote::new(None, StatusCode::OK);
    let addr = spawn_remote(remote.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default().with_data_dir(dir.path());
    config.index_url = format!("http://{addr}/solr/alunos");
    write_transformed(&enriched_frame(5), &config.transformed_path()).unwrap();

    let client = build_client().unwrap();
    let summary = publish_step(&client, &config).await.unwrap();
    assert_eq!(summary.status, 200);
    assert_eq!(summary.published_rows, 5);

    let requests = remote.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.content_type.as_deref(), Some("text/csv"));
    assert_eq!(request.query.get("commit").map(String::as_str), Some("true"));

    let lines: Vec<&str> = request.body.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], HEADER);
    let ids: Vec<&str> = lines[1..]
        .iter()
        .map(|line| line.rsplit(',').next().unwrap())
        .collect();
    assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
    assert!(lines[2].starts_with("Bruno Souza,Bruno,"));
}

#[tokio::test]
async fn publish_without_rows_sends_nothing() {
    let remote = FakeRemote::new(None, StatusCode::OK);
    let addr = spawn_remote(remote.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default().with_data_dir(dir.path());
    config.index_url = format!("http://{addr}/solr/alunos");
    write_transformed(&enriched_frame(0), &config.transformed_path()).unwrap();

    let client = build_client().unwrap();
    let err = publish_step(&client, &config).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyAfterCleaning));
    assert!(remote.requests().is_empty());
}

#[tokio::test]
async fn publish_requires_transformed_file() {
    let remote = FakeRemote::new(None, StatusCode::OK);
    let addr = spawn_remote(remote.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default().with_data_dir(dir.path());
    config.index_url = format!("http://{addr}/solr/alunos");

    let client = build_client().unwrap();
    let err = publish_step(&client, &config).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { .. }));
    assert!(remote.requests().is_empty());
}

#[tokio::test]
async fn index_rejection_is_fatal() {
    let remote = FakeRemote::new(None, StatusCode::BAD_REQUEST);
    let addr = spawn_remote(remote.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default().with_data_dir(dir.path());
    config.index_url = format!("http://{addr}/solr/alunos/");
    write_transformed(&enriched_frame(3), &config.transformed_path()).unwrap();

    let client = build_client().unwrap();
    let err = publish_step(&client, &config).await.unwrap_err();
    assert!(matches!(err, PipelineError::Transport(_)));
    assert_eq!(remote.requests().len(), 1);
}
