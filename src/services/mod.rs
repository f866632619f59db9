pub mod blending;
pub mod change_capture;
pub mod dispatcher;
pub mod invalidation;
pub mod recommendations;
pub mod strategies;

pub use blending::BlendingEngine;
pub use change_capture::{ChangeCaptureSource, NotificationListener, MONITORED_CHANNELS};
pub use dispatcher::{EventDispatcher, EventHandler};
pub use invalidation::CacheInvalidator;
pub use recommendations::RecommendationService;
pub use strategies::{RecommendationStrategies, StoreBackedStrategies};
