//! 类型定义模块

mod document;
mod field;
mod form;
pub mod navigation;
mod request;

pub use document::{
    DocumentBody, FieldError, PingDirective, RefreshDirective, ServerDocument, Status, StatusLevel,
    Tab, UserInfo,
};
pub use field::{FieldDefinition, FieldModel, FieldType, FieldValue, SelectOption};
pub use form::FormDefinition;
pub use navigation::NavEntry;
pub use request::{ParamValue, Request, RequestPayload};
