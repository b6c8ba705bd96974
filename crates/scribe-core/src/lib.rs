pub mod annotations;
pub mod error;
pub mod events;
pub mod merge;
pub mod object;
pub mod template;
pub mod validation;

pub use annotations::{Annotations, LAST_APPLIED_ANNOTATION, TEMPLATE_ANNOTATION};
pub use error::{CoreError, Result};
pub use merge::{MergeOutcome, last_applied_from, merge};
pub use object::{GroupVersionKind, ManagedObject, ObjectKey, ObjectReference};
pub use template::{DotPathEvaluator, ExpressionEvaluator, Template, TemplateError};
pub use validation::{
    ANNOTATION_VALIDATION_FAILURE, ValidationError, ValidationErrors, validate_annotations,
    validate_key,
};
