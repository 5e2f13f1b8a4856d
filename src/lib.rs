//! # bizdesk
//!
//! A customer-support assistant for small businesses.
//!
//! A business owner uploads a document describing their business (PDF,
//! DOCX, DOC, TXT or CSV). bizdesk extracts the text, splits it into
//! overlapping chunks, embeds them into a vector collection and asks a
//! language model for FAQs, a product list and general business facts.
//! Customers then chat with an assistant that answers from the retrieved
//! chunks (retrieval-augmented generation).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐
//! │  Upload  │──▶│   Pipeline   │──▶│ SQLite: rows  │
//! │ HTTP/CLI │   │ Extract+Chunk│   │ SQLite: vecs  │
//! └──────────┘   │ Embed+Insight│   └──────┬────────┘
//!                └──────────────┘          │
//!                                          ▼
//!                                    ┌───────────┐
//!                                    │ RAG chat  │
//!                                    └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! bizdesk init                               # create both databases
//! bizdesk ingest ./about.pdf --name "Acme"   # run the upload pipeline
//! bizdesk ask <business_id> "When do you open?"
//! bizdesk serve                              # start the web app
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`models`] | Core data types |
//! | [`business`] | Business records |
//! | [`extract`] | Text extraction per file type |
//! | [`chunk`] | Recursive character text splitter |
//! | [`openai`] | OpenAI REST client |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat completion provider abstraction |
//! | [`vector_store`] | Vector collection, indexing and retrieval |
//! | [`insights`] | FAQ generation and business data extraction |
//! | [`rag`] | Context assembly and answer generation |
//! | [`app`] | Shared application context |
//! | [`ingest`] | Upload pipeline |
//! | [`session`] | Signed session cookie |
//! | [`server`] | HTTP server |
//! | [`commands`] | CLI commands |

pub mod app;
pub mod business;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod insights;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod openai;
pub mod rag;
pub mod server;
pub mod session;
pub mod vector_store;
