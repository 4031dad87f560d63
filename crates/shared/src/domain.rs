use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);
    };
}

id_newtype!(PatientId);
id_newtype!(NoteId);
id_newtype!(MasterItemId);

/// Master-data classification understood by `/api/master/items/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MasterCategory {
    #[serde(rename = "DX")]
    Diagnosis,
    #[serde(rename = "DRG")]
    Drug,
    /// Tests and procedures share one backing category.
    #[serde(rename = "ACT")]
    Activity,
}

impl MasterCategory {
    pub fn code(self) -> &'static str {
        match self {
            Self::Diagnosis => "DX",
            Self::Drug => "DRG",
            Self::Activity => "ACT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Drug,
    Test,
    Proc,
    Favorite,
    Bundle,
}

impl OrderType {
    /// `None` for tabs that have no queryable backing store yet.
    pub fn master_category(self) -> Option<MasterCategory> {
        match self {
            Self::Drug => Some(MasterCategory::Drug),
            Self::Test | Self::Proc => Some(MasterCategory::Activity),
            Self::Favorite | Self::Bundle => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Drug => "drug",
            Self::Test => "test",
            Self::Proc => "procedure/other",
            Self::Favorite => "favorite",
            Self::Bundle => "bundle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisSource {
    Master,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "U")]
    Other,
}
