//! Imported function bindings
//!
//! An [`ExternalFunction`] fills one imported function slot of an instance.
//! It is either a host closure or a forwarder into a function of another
//! instance, reached through an [`InstanceLink`].

use super::executor::execute;
use super::instance::{Instance, InstantiationError};
use super::{ExecutionResult, Trap, Value};
use crate::parser::module::{FunctionType, ImportKind, Module};
use once_cell::unsync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Host callable: receives the calling instance, the arguments and the call
/// depth of this activation.
pub type HostFunc = dyn Fn(&Instance, &[Value], u32) -> ExecutionResult;

/// A callable bound to one imported function slot, plus its type.
#[derive(Clone)]
pub struct ExternalFunction {
    function: Rc<HostFunc>,
    func_type: FunctionType,
}

impl ExternalFunction {
    pub fn new<F>(func_type: FunctionType, function: F) -> Self
    where
        F: Fn(&Instance, &[Value], u32) -> ExecutionResult + 'static,
    {
        ExternalFunction {
            function: Rc::new(function),
            func_type,
        }
    }

    /// A host function with an empty signature, to be filled in from the
    /// importing module's declaration at instantiation.
    pub fn untyped<F>(function: F) -> Self
    where
        F: Fn(&Instance, &[Value], u32) -> ExecutionResult + 'static,
    {
        Self::new(FunctionType::default(), function)
    }

    /// Forward calls to function `func_idx` of the instance behind `link`.
    ///
    /// The forwarded call runs at the same depth the importing call was
    /// issued with. Calling through a link that was never bound, or whose
    /// instance has been dropped, traps.
    pub fn forward(link: InstanceLink, func_idx: u32, func_type: FunctionType) -> Self {
        Self::new(func_type, move |_caller, args, depth| match link.get() {
            Some(target) => execute(&target, func_idx, args, depth),
            None => ExecutionResult::Trapped(Trap::UnlinkedInstance),
        })
    }

    /// Forward to the function `target` exports as `name`, taking its type
    /// from the target. Returns `None` if there is no such export.
    pub fn from_export(target: &Rc<Instance>, name: &str) -> Option<Self> {
        let func_idx = target.find_exported_function(name)?;
        let func_type = target.function_type(func_idx)?.clone();
        Some(Self::forward(InstanceLink::to(target), func_idx, func_type))
    }

    pub fn func_type(&self) -> &FunctionType {
        &self.func_type
    }

    pub(crate) fn set_func_type(&mut self, func_type: FunctionType) {
        self.func_type = func_type;
    }

    pub fn call(&self, instance: &Instance, args: &[Value], depth: u32) -> ExecutionResult {
        (self.function)(instance, args, depth)
    }
}

impl fmt::Debug for ExternalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalFunction")
            .field("func_type", &self.func_type)
            .finish_non_exhaustive()
    }
}

/// Late-bindable, non-owning handle to an instance.
///
/// Links let two instances import from each other: create the link first,
/// instantiate the importer with forwarders over it, then bind the link once
/// the target exists. The handle is weak, so linked instances never keep each
/// other alive.
#[derive(Clone, Default)]
pub struct InstanceLink(Rc<OnceCell<Weak<Instance>>>);

impl InstanceLink {
    /// An unbound link.
    pub fn new() -> Self {
        Self::default()
    }

    /// A link already bound to `target`.
    pub fn to(target: &Rc<Instance>) -> Self {
        let link = Self::new();
        link.bind(target);
        link
    }

    /// Bind the link. Returns false if it was already bound.
    pub fn bind(&self, target: &Rc<Instance>) -> bool {
        self.0.set(Rc::downgrade(target)).is_ok()
    }

    pub fn is_bound(&self) -> bool {
        self.0.get().is_some()
    }

    pub fn get(&self) -> Option<Rc<Instance>> {
        self.0.get().and_then(Weak::upgrade)
    }
}

impl fmt::Debug for InstanceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InstanceLink").field(&self.is_bound()).finish()
    }
}

/// Container for imported functions keyed by (module_name, field_name)
#[derive(Debug, Clone, Default)]
pub struct ImportObject {
    functions: HashMap<(String, String), ExternalFunction>,
}

impl ImportObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, module: impl Into<String>, name: impl Into<String>, function: ExternalFunction) {
        self.functions.insert((module.into(), name.into()), function);
    }

    pub fn get_function(&self, module: &str, name: &str) -> Option<&ExternalFunction> {
        self.functions.get(&(module.to_string(), name.to_string()))
    }

    /// Order this object's functions by `module`'s import declarations.
    pub fn resolve(&self, module: &Module) -> Result<Vec<ExternalFunction>, InstantiationError> {
        resolve_imports(module, self)
    }
}

/// Name-based import resolution.
///
/// Produces the positional import vector `instantiate` expects: one entry
/// per imported function of `module`, in declaration order.
pub fn resolve_imports(module: &Module, imports: &ImportObject) -> Result<Vec<ExternalFunction>, InstantiationError> {
    module
        .imports
        .iter()
        .filter(|import| matches!(import.kind, ImportKind::Function(_)))
        .map(|import| {
            imports
                .get_function(&import.module, &import.name)
                .cloned()
                .ok_or_else(|| InstantiationError::UnknownImport {
                    module: import.module.clone(),
                    name: import.name.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::{Import, ValueType};

    fn i32_to_i32() -> FunctionType {
        FunctionType::new(vec![ValueType::I32], vec![ValueType::I32])
    }

    #[test]
    fn test_unbound_link() {
        let link = InstanceLink::new();
        assert!(!link.is_bound());
        assert!(link.get().is_none());
    }

    #[test]
    fn test_external_function_keeps_type() {
        let function = ExternalFunction::new(i32_to_i32(), |_, _, _| ExecutionResult::Void);
        assert_eq!(function.func_type(), &i32_to_i32());
        assert_eq!(ExternalFunction::untyped(|_, _, _| ExecutionResult::Void).func_type(), &FunctionType::default());
    }

    #[test]
    fn test_resolve_orders_by_declaration() {
        let module = Module {
            types: vec![i32_to_i32(), FunctionType::default()],
            imports: vec![
                Import {
                    module: "env".to_string(),
                    name: "second".to_string(),
                    kind: ImportKind::Function(1),
                },
                Import {
                    module: "env".to_string(),
                    name: "first".to_string(),
                    kind: ImportKind::Function(0),
                },
            ],
            ..Default::default()
        };

        let mut imports = ImportObject::new();
        imports.add_function("env", "first", ExternalFunction::new(i32_to_i32(), |_, _, _| ExecutionResult::Void));
        imports.add_function("env", "second", ExternalFunction::untyped(|_, _, _| ExecutionResult::Void));

        let resolved = imports.resolve(&module).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].func_type(), &FunctionType::default());
        assert_eq!(resolved[1].func_type(), &i32_to_i32());

        let missing = ImportObject::new().resolve(&module).unwrap_err();
        assert_eq!(
            missing,
            InstantiationError::UnknownImport {
                module: "env".to_string(),
                name: "second".to_string()
            }
        );
    }
}
