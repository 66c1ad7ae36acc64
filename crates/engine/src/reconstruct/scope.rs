// Storyline - Script Execution Story Builder
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Lexical scope model and the visible-scopes snapshot taken at every step.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use storyline_common::{
    BindingType, FrameId, InvocationId, LexicalId, ScopeKind, ScopeView, TracedValue,
    VariableView, GLOBAL_SCOPE,
};

/// A variable-binding context tied to where a function is defined, shared by
/// all invocations of that function.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalScope {
    /// Lexical id.
    pub id: LexicalId,
    /// Display name; filled in by the first activation.
    pub name: String,
    /// Defining scope.
    pub parent_id: Option<LexicalId>,
    /// Scope the function closes over.
    pub closure_scope_id: Option<LexicalId>,
    /// `this` of the most recent activation.
    pub this_binding: Option<TracedValue>,
    /// Whether an inner function closes over this scope.
    pub is_persistent: bool,
    /// Parameter names, in order.
    pub params: Vec<String>,
    /// Names this scope declares (parameters included).
    pub declared: BTreeSet<String>,
    /// Latest known values, including writes to names declared elsewhere.
    pub variables: BTreeMap<String, TracedValue>,
    /// Free variables announced when the function was created as a closure.
    pub captured: BTreeSet<String>,
}

impl LexicalScope {
    /// Creates an empty scope.
    pub fn new(id: LexicalId, parent_id: Option<LexicalId>) -> Self {
        Self {
            name: id.to_string(),
            id,
            parent_id,
            closure_scope_id: None,
            this_binding: None,
            is_persistent: false,
            params: vec![],
            declared: BTreeSet::new(),
            variables: BTreeMap::new(),
            captured: BTreeSet::new(),
        }
    }

    /// The global scope every reduction starts with.
    pub fn global() -> Self {
        Self::new(LexicalId::global(), None)
    }

    /// Whether this is the global scope.
    pub fn is_global(&self) -> bool {
        self.id.is_global()
    }

    /// Whether this scope declares `name`. The global scope also owns
    /// implicit globals, which are never announced.
    pub fn declares(&self, name: &str) -> bool {
        self.declared.contains(name) || (self.is_global() && self.variables.contains_key(name))
    }

    /// Adds declarations, keeping the values already known.
    pub fn declare<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            self.declared.insert(name.clone());
            self.variables.entry(name.clone()).or_insert_with(TracedValue::undefined);
        }
    }

    fn kind(&self) -> ScopeKind {
        if self.is_global() {
            ScopeKind::Global
        } else if self.is_persistent {
            ScopeKind::Closure
        } else {
            ScopeKind::Function
        }
    }
}

/// All lexical scopes known to a reduction, keyed by lexical id.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeArena {
    scopes: BTreeMap<LexicalId, LexicalScope>,
}

impl Default for ScopeArena {
    fn default() -> Self {
        let global = LexicalScope::global();
        Self { scopes: BTreeMap::from([(global.id.clone(), global)]) }
    }
}

impl ScopeArena {
    /// Looks up a scope.
    pub fn get(&self, id: &LexicalId) -> Option<&LexicalScope> {
        self.scopes.get(id)
    }

    /// Looks up a scope for modification.
    pub fn get_mut(&mut self, id: &LexicalId) -> Option<&mut LexicalScope> {
        self.scopes.get_mut(id)
    }

    /// Whether a scope exists.
    pub fn contains(&self, id: &LexicalId) -> bool {
        self.scopes.contains_key(id)
    }

    /// Returns the scope, creating it when missing.
    pub fn entry(&mut self, id: &LexicalId, parent_id: Option<&LexicalId>) -> &mut LexicalScope {
        self.scopes
            .entry(id.clone())
            .or_insert_with(|| LexicalScope::new(id.clone(), parent_id.cloned()))
    }

    /// The global scope.
    pub fn global_mut(&mut self) -> &mut LexicalScope {
        self.entry(&LexicalId::global(), None)
    }

    /// Number of scopes, global included.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Always false: the global scope is never removed.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// The nearest scope on `start`'s parent chain (itself included) that
    /// declares `name`, falling back to the global scope.
    pub fn defining_scope(&self, start: &LexicalId, name: &str) -> Option<&LexicalScope> {
        let mut seen = HashSet::new();
        let mut current = self.get(start);
        while let Some(scope) = current {
            if !seen.insert(&scope.id) {
                break;
            }
            if scope.declares(name) {
                return Some(scope);
            }
            current = scope.parent_id.as_ref().and_then(|parent| self.get(parent));
        }
        self.get(&LexicalId::global()).filter(|global| global.declares(name))
    }

    /// Classifies `name` as shown in scope `home`.
    pub fn classify(&self, home: &LexicalId, name: &str) -> BindingType {
        binding_type(home, self.defining_scope(home, name))
    }

    /// The scopes visible while `stack` is live: global first, then every
    /// scope reachable from a live activation through parent and closure
    /// links, then every persistent scope not reached yet along with its
    /// ancestors. Each scope appears once.
    pub fn visible(
        &self,
        stack: &[FrameId],
        lexical_of: impl Fn(InvocationId) -> Option<LexicalId>,
    ) -> Vec<ScopeView> {
        let mut order = vec![];
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([LexicalId::global()]);
        queue.extend(stack.iter().filter_map(FrameId::invocation).filter_map(&lexical_of));
        self.expand(&mut queue, &mut order, &mut visited, true);

        for scope in self.scopes.values().filter(|scope| scope.is_persistent) {
            if visited.contains(&scope.id) {
                continue;
            }
            queue.push_back(scope.id.clone());
            self.expand(&mut queue, &mut order, &mut visited, false);
        }

        order.iter().filter_map(|id| self.get(id)).map(|scope| self.view(scope)).collect()
    }

    fn expand(
        &self,
        queue: &mut VecDeque<LexicalId>,
        order: &mut Vec<LexicalId>,
        visited: &mut HashSet<LexicalId>,
        follow_closures: bool,
    ) {
        while let Some(id) = queue.pop_front() {
            let Some(scope) = self.get(&id) else { continue };
            if !visited.insert(id.clone()) {
                continue;
            }
            order.push(id);
            queue.extend(scope.parent_id.iter().cloned());
            if follow_closures {
                queue.extend(scope.closure_scope_id.iter().cloned());
            }
        }
    }

    fn view(&self, scope: &LexicalScope) -> ScopeView {
        ScopeView {
            lexical_id: scope.id.clone(),
            kind: scope.kind(),
            name: if scope.is_global() { GLOBAL_SCOPE.to_string() } else { scope.name.clone() },
            parent_id: scope.parent_id.clone(),
            closure_scope_id: scope.closure_scope_id.clone(),
            this_binding: scope.this_binding.clone(),
            is_persistent: scope.is_persistent,
            variables: self.variables(scope),
        }
    }

    /// Variables shown in `scope`: everything written through it plus the
    /// names it captured. A name declared further out shows the defining
    /// scope's current value. Captured globals are left to the global scope.
    fn variables(&self, scope: &LexicalScope) -> Vec<VariableView> {
        let names = scope.variables.keys().chain(&scope.captured).collect::<BTreeSet<_>>();
        names
            .into_iter()
            .filter_map(|name| {
                let owner = self.defining_scope(&scope.id, name);
                let own = scope.variables.get(name);
                if own.is_none() && owner.is_none_or(LexicalScope::is_global) {
                    return None;
                }
                let value = match owner {
                    Some(owner) if owner.id != scope.id => owner.variables.get(name).or(own),
                    _ => own,
                };
                Some(VariableView {
                    name: name.clone(),
                    value: value.cloned().unwrap_or_else(TracedValue::undefined),
                    binding_type: binding_type(&scope.id, owner),
                })
            })
            .collect()
    }
}

fn binding_type(home: &LexicalId, owner: Option<&LexicalScope>) -> BindingType {
    match owner {
        None => BindingType::Unknown,
        Some(scope) if scope.is_global() => BindingType::Global,
        Some(scope) if &scope.id == home => BindingType::Local,
        Some(scope) if scope.is_persistent => BindingType::Closure,
        Some(_) => BindingType::AncestorNonPersistent,
    }
}
