use serde::{Deserialize, Serialize};

/// Names of the repository (system) columns present on every object table.
pub mod repo_columns {
    pub const OBJECT_ID: &str = "object_id";
    pub const PKID: &str = "pkid";
    pub const PARENT_ID: &str = "parent_id";
    pub const DT_INSERT: &str = "dt_insert";
    pub const DT_DELETE: &str = "dt_delete";
    pub const STATUS: &str = "status";
    pub const USER_ID: &str = "user_id";
}

/// Column data type as known to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Float,
    #[default]
    Text,
    Date,
    Bool,
    Geometry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    pub fn is_geometry(&self) -> bool {
        self.field_type == FieldType::Geometry
    }
}

fn default_repo_table() -> String {
    "repository".to_string()
}

fn default_row_id_column() -> String {
    repo_columns::PKID.to_string()
}

/// Repository columns in their fixed projection order
pub fn default_repo_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new(repo_columns::OBJECT_ID, FieldType::Integer),
        FieldDescriptor::new(repo_columns::PKID, FieldType::Integer),
        FieldDescriptor::new(repo_columns::PARENT_ID, FieldType::Integer),
        FieldDescriptor::new(repo_columns::DT_INSERT, FieldType::Date),
        FieldDescriptor::new(repo_columns::DT_DELETE, FieldType::Date),
        FieldDescriptor::new(repo_columns::STATUS, FieldType::Text),
        FieldDescriptor::new(repo_columns::USER_ID, FieldType::Integer),
    ]
}

/// Resolved description of one object type's storage.
///
/// Every object type is stored as a shared repository table (system columns)
/// plus a type table (type-specific columns), joined on `row_id_column`. The
/// catalog also publishes a pre-joined view `v_<table_name>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub object_type_id: i64,
    /// Logical name, e.g. `ANIMAL`
    pub name: String,
    pub schema: String,
    /// Physical type table name
    pub table_name: String,
    #[serde(default = "default_repo_table")]
    pub repo_table: String,
    /// Column of the type table that references the repository row
    #[serde(default = "default_row_id_column")]
    pub row_id_column: String,
    #[serde(default = "default_repo_fields")]
    pub repo_fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub type_fields: Vec<FieldDescriptor>,
}

impl TableDescriptor {
    /// Descriptor with the default repository layout and a `pkid` row-id column
    /// prepended to the given type columns.
    pub fn new(
        object_type_id: i64,
        name: impl Into<String>,
        schema: impl Into<String>,
        table_name: impl Into<String>,
        type_fields: Vec<FieldDescriptor>,
    ) -> Self {
        let mut fields = vec![FieldDescriptor::new(
            repo_columns::PKID,
            FieldType::Integer,
        )];
        fields.extend(type_fields);
        Self {
            object_type_id,
            name: name.into(),
            schema: schema.into(),
            table_name: table_name.into(),
            repo_table: default_repo_table(),
            row_id_column: default_row_id_column(),
            repo_fields: default_repo_fields(),
            type_fields: fields,
        }
    }

    /// `schema.v_table`
    pub fn qualified_view(&self) -> String {
        format!("{}.v_{}", self.schema, self.table_name)
    }

    /// `schema.table`
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table_name)
    }

    /// `schema.repository`
    pub fn qualified_repo_table(&self) -> String {
        format!("{}.{}", self.schema, self.repo_table)
    }

    pub fn is_repo_field(&self, name: &str) -> bool {
        self.repo_fields.iter().any(|f| f.name == name)
    }

    pub fn is_geometry_field(&self, name: &str) -> bool {
        self.repo_fields
            .iter()
            .chain(self.type_fields.iter())
            .any(|f| f.name == name && f.is_geometry())
    }

    /// Type columns that are projected (the row-id column is skipped)
    pub fn projected_type_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.type_fields
            .iter()
            .filter(move |f| f.name != self.row_id_column)
    }
}

/// A configured relationship resolved through the generic link table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescriptor {
    pub id: i64,
    pub name: String,
    pub type_a: i64,
    pub type_b: i64,
}
