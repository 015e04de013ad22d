// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the fwdiff project (forward-mode differentiation by tree rewriting).

//! Process-wide table of derivatives attached to user functions.
//!
//! Entries are keyed by [`FunctionId`], so every clone of a registered
//! `Arc<Function>` resolves to the same derivative. Registering the same
//! function again replaces its entry.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::eval::{Function, FunctionId};

use super::boxing::DerivativeFunction;

type Table = RwLock<HashMap<FunctionId, Arc<DerivativeFunction>>>;

fn table() -> &'static Table {
    static TABLE: OnceLock<Table> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

pub(crate) fn insert(id: FunctionId, derivative: Arc<DerivativeFunction>) {
    let mut map = match table().write() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.insert(id, derivative);
}

pub(crate) fn lookup(id: FunctionId) -> Option<Arc<DerivativeFunction>> {
    let map = match table().read() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.get(&id).cloned()
}

/// Derivative attached to `f` by `register_differentiable`, if any.
pub fn derivative_of(f: &Function) -> Option<Arc<DerivativeFunction>> {
    lookup(f.id())
}
