//! The twelve detection phases.

pub mod annotations;
pub mod arrays;
pub mod composition;
pub mod constraints;
pub mod definitions;
pub mod meta;
pub mod object_shape;
pub mod properties;
pub mod references;
pub mod required;
pub mod revalidation;
pub mod type_system;

pub use annotations::AnnotationPhase;
pub use arrays::ArrayPhase;
pub use composition::CompositionPhase;
pub use constraints::ConstraintPhase;
pub use definitions::DefinitionPhase;
pub use meta::MetaPhase;
pub use object_shape::ObjectShapePhase;
pub use properties::PropertyPhase;
pub use references::ReferencePhase;
pub use required::RequiredPhase;
pub use revalidation::RevalidationPhase;
pub use type_system::TypePhase;

use crate::phase::DetectionPhase;

/// All phases in priority order.
pub fn default_phases() -> Vec<Box<dyn DetectionPhase>> {
    vec![
        Box::new(MetaPhase),
        Box::new(ReferencePhase),
        Box::new(DefinitionPhase),
        Box::new(CompositionPhase),
        Box::new(ObjectShapePhase),
        Box::new(PropertyPhase),
        Box::new(ArrayPhase),
        Box::new(TypePhase),
        Box::new(ConstraintPhase),
        Box::new(RequiredPhase),
        Box::new(AnnotationPhase),
        Box::new(RevalidationPhase),
    ]
}
