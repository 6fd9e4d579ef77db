pub mod classifier;
pub mod route_layer;

pub use classifier::{
    Classification, IntentClassifier, IntentRoute, RouteName, StaticClassifier, top_intent,
};
pub use route_layer::RouteLayer;
