// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS module system
//!
//! - `require()` scoped to the requiring module, with an override table
//! - `require.resolve()` and `requireUncached()`
//! - `module.exports` / `exports`
//! - Two-tier resolution (package-aware, then raw search paths)
//! - Dependency cache with transitive invalidation

mod cache;
mod loader;
mod require;
mod resolver;
pub mod wrapper;

pub use cache::{ModuleCache, ModuleRecord};
pub use loader::{CachedExports, ModuleLoader};
pub use require::{RequireScope, create_require, create_require_uncached, require_from};
pub use resolver::ModuleResolver;
