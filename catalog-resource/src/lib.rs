//! The interface between a deployment tool and a catalog resource provider.
//!
//! A provider is an executable that receives a single request message on its
//! original standard input and answers with a single response message on its
//! original standard output. Both messages are JSON, described by the types in
//! [`schema::v0`].
//!
//! Providers implement [`framework::ResourceProvider`] and hand it to
//! [`framework::run_main`], which takes care of the stdio plumbing.

pub mod framework;
pub mod schema;
