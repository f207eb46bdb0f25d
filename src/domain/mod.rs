//! Builder domain model
pub mod metadata;
pub mod vocabulary;

pub use metadata::{
    BuilderStatus, MetadataEdit, SettingEdit, SettingMeta, SettingRow, StoneEdit, StoneMeta,
    StoneRow,
};
pub use vocabulary::{ClarityGrade, ColorGrade, EntityKind, Metal, SettingStyle, StoneShape};
