pub mod template;
pub mod decoder;
pub mod matcher;
pub mod prompts;
pub mod client;
pub mod pipeline;
pub mod dedupe;
pub mod dataset;
pub mod store;
pub mod evaluate;
