// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data element engine.
//!
//! # Architecture
//!
//! ```text
//! peer call --> ForwarderRegistry --facet--> DataElement::forward
//!                                                 |
//! local call -------------------------------> DataElement (state lock)
//!                                                 |-- Registry (listeners/subscribers)
//!                                                 |-- PriorityRanking (readers)
//!                                                 |-- retention::insert
//!                                                 |-- OutboundLane per listener --> Session::invoke
//!                                                 `-- CallbackExecutor (hooks, off-lock)
//! ```
//!
//! # Components
//!
//! - **TopicCore**: element arena, id allocation, updaters, shared executor
//! - **DataElement**: attach/detach protocol, waiters, destroy, forwarding
//! - **Registry**: listeners per (peer, facet), subscribers per remote element
//! - **OutboundLane**: per-listener FIFO delivery worker, isolates slow peers
//! - **CallbackExecutor**: serial FIFO worker with panic isolation

pub mod arena;
pub mod element;
pub mod executor;
pub mod lane;
pub mod registry;

pub use arena::{TopicCore, Updater};
pub use element::{AttachAck, Capability, Connection, DataElement, ElementKind};
pub use executor::CallbackExecutor;
pub use lane::OutboundLane;
pub use registry::{DetachOutcome, Listener, ListenerKey, Registry, Subscriber};
