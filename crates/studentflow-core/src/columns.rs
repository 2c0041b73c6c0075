//! Column names of the source table and of the enriched table.

pub const NOME: &str = "Nome";
pub const NOME_DO_PAI: &str = "Nome do Pai";
pub const NOME_DA_MAE_SOURCE: &str = "Nome da Mãe";
pub const DATA_DE_NASCIMENTO: &str = "Data de Nascimento";
pub const IDADE: &str = "Idade";
pub const SERIE_SOURCE: &str = "Série";
pub const NOTA_MEDIA_SOURCE: &str = "Nota Média";
pub const ENDERECO_SOURCE: &str = "Endereço";

pub const NOME_DA_MAE: &str = "Nome da Mae";
pub const SERIE: &str = "Serie";
pub const NOTA_MEDIA: &str = "Nota Media";
pub const ENDERECO: &str = "Endereco";
pub const IDADE_CORRETA: &str = "Idade Correta";
pub const ANO_DE_NASCIMENTO: &str = "Ano de Nascimento";
pub const RUA: &str = "Rua";
pub const NOME_COMPLETO: &str = "Nome Completo";
pub const STATUS_GERAL: &str = "Status Geral";
pub const ID: &str = "id";

pub const SOURCE_COLUMNS: [&str; 8] = [
    NOME,
    NOME_DO_PAI,
    NOME_DA_MAE_SOURCE,
    DATA_DE_NASCIMENTO,
    IDADE,
    SERIE_SOURCE,
    NOTA_MEDIA_SOURCE,
    ENDERECO_SOURCE,
];

/// Label normalisation applied after the age is recomputed.
pub const RENAMES: [(&str, &str); 5] = [
    (NOME_DA_MAE_SOURCE, NOME_DA_MAE),
    (NOTA_MEDIA_SOURCE, NOTA_MEDIA),
    (SERIE_SOURCE, SERIE),
    (IDADE_CORRETA, IDADE),
    (ENDERECO_SOURCE, ENDERECO),
];

pub const OUTPUT_COLUMNS: [&str; 10] = [
    NOME_COMPLETO,
    NOME,
    SERIE,
    IDADE,
    ANO_DE_NASCIMENTO,
    DATA_DE_NASCIMENTO,
    ENDERECO,
    RUA,
    NOTA_MEDIA,
    STATUS_GERAL,
];
