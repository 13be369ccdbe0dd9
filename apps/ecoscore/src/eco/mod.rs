pub mod achievements;
pub mod aggregator;
pub mod gamification;
pub mod handlers;
pub mod impact;
pub mod locks;
pub mod notifier;
pub mod pipeline;
pub mod rollup;
pub mod rules;
pub mod streak;
