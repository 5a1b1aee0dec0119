//! Retrieval Datastore - pluggable graph storage for the retrieval service
//!
//! Loads the airport, amenity, flight and policy datasets from CSV, writes
//! them into a graph backend (Neo4j or PostgreSQL + Apache AGE) and serves
//! backend-native queries over the result.

pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod models;

pub use client::{create, create_with, ClientState, Datastore, GraphDatastore};
pub use config::{BackendKind, Config, IngestConfig, Settings};
pub use dataset::{Dataset, DatasetPaths};
pub use error::DatastoreError;
