//! # Search Agent
//!
//! A web search LLM agent behind a single HTTP endpoint.
//!
//! This library provides:
//! - An HTTP API (`POST /chat`) that answers a message with an agent run
//! - A tool-calling agent loop whose only tool is Tavily web search
//! - A persistent cache of whole agent runs, keyed by message and model
//!
//! ## Architecture
//!
//! 1. Receive a message via the API
//! 2. Return a cached answer if the same message and model were seen before
//! 3. Otherwise build a fresh agent, call the LLM, execute search calls,
//!    feed results back, repeat until an answer or the iteration cap
//! 4. Store and return the answer
//!
//! ## Example
//!
//! ```rust,ignore
//! use search_agent::{agent::{AgentFactory, AgentRunner}, config::Config};
//!
//! let config = Config::from_env()?;
//! let factory = AgentFactory::from_config(&config);
//! let answer = factory.run_agent("What is the capital of France?", "gpt-4-turbo-preview").await?;
//! ```

pub mod agent;
pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod llm;
pub mod tools;

pub use config::Config;
