use serde::{Deserialize, Serialize};

/// Tipo de dato de una entrada o salida de aplicación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    #[default]
    String,
    Integer,
    Float,
    Uri,
    UriCollection,
    Stdout,
    Stderr,
}

/// Declaración de entrada o salida. Dentro de una lista se identifica por
/// `name`, que es la clave de reconciliación.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataParam {
    pub name: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub application_argument: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default)]
    pub required_to_added_to_command_line: bool,
    #[serde(default)]
    pub standard_input: bool,
    #[serde(default)]
    pub data_staged: bool,
    #[serde(default)]
    pub storage_resource_id: Option<String>,
    #[serde(default)]
    pub meta_data: Option<String>,
    #[serde(default)]
    pub user_friendly_description: Option<String>,
    #[serde(default)]
    pub override_filename: Option<String>,
}

impl DataParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(),
               value: Some(value.into()),
               ..Self::default() }
    }
}
