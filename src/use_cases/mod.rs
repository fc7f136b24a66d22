pub mod decision_engine;

pub use decision_engine::DecisionEngine;
