// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cog core - composition objects with undo/redo
//!
//! Generation-checked handles, cogs built from typed components with
//! dependency rules, stack-free hierarchy traversal and a batched
//! undo/redo queue.

pub mod cog;
pub mod cog_operations;
pub mod component;
pub mod config;
pub mod dependency;
pub mod error;
pub mod event;
pub mod handle;
pub mod hierarchy;
pub mod observer;
pub mod operation;
pub mod prelude;
pub mod profiling;
pub mod property;
pub mod snapshot;
pub mod space;
pub mod undo_map;

pub use cog::*;
pub use cog_operations::*;
pub use component::*;
pub use config::*;
pub use dependency::*;
pub use error::*;
pub use event::*;
pub use handle::*;
pub use hierarchy::*;
pub use observer::*;
pub use operation::*;
pub use property::*;
pub use snapshot::*;
pub use space::*;
pub use undo_map::*;
