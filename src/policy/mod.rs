//! Domain politeness: robots.txt rules, crawl delays, request spacing

mod parser;
mod store;

pub use parser::ParsedRobots;
pub use store::{DomainPolicy, PolicyStore, DELAY_CEILING_SECS};
