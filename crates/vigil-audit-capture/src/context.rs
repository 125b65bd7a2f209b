//! Per-call audit context and the builder that assembles it.

use crate::operations::{AuditedInstance, OperationError};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;
use vigil_audit_types::{
    MethodIdentity, ParameterAnnotation, ParameterDescriptor, StrategyOption, DEFAULT_AUDITED_TYPE,
};

/// Snapshot of one intercepted call, handed to a single strategy.
///
/// The receiver is borrowed, so a context cannot outlive the call it
/// describes. Arguments are owned snapshots.
#[derive(Clone)]
pub struct AuditContext<'r> {
    audited_type: String,
    method: MethodIdentity,
    receiver: Option<&'r dyn AuditedInstance>,
    arguments: Vec<Value>,
    argument_annotations: BTreeMap<usize, Vec<ParameterAnnotation>>,
    arguments_by_description: HashMap<String, Value>,
    options: Vec<StrategyOption>,
}

impl<'r> AuditContext<'r> {
    /// Audited-type tag of the call.
    pub fn audited_type(&self) -> &str {
        &self.audited_type
    }

    /// Identity of the audited method.
    pub fn method(&self) -> &MethodIdentity {
        &self.method
    }

    /// The instance the method was called on, absent for free functions.
    pub fn receiver(&self) -> Option<&'r dyn AuditedInstance> {
        self.receiver
    }

    /// Call arguments in positional order.
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Argument at a position.
    pub fn argument(&self, position: usize) -> Option<&Value> {
        self.arguments.get(position)
    }

    /// Declared annotations per argument position.
    ///
    /// Positions beyond the declared parameters have no entry.
    pub fn argument_annotations(&self) -> &BTreeMap<usize, Vec<ParameterAnnotation>> {
        &self.argument_annotations
    }

    /// Declared annotations of the first argument equal to `value`.
    pub fn annotations_for(&self, value: &Value) -> Option<&[ParameterAnnotation]> {
        let position = self.arguments.iter().position(|a| a == value)?;
        self.argument_annotations
            .get(&position)
            .map(Vec::as_slice)
    }

    /// Arguments keyed by their declared parameter description.
    pub fn arguments_by_description(&self) -> &HashMap<String, Value> {
        &self.arguments_by_description
    }

    /// Argument declared with the given description.
    pub fn argument_by_description(&self, description: &str) -> Option<&Value> {
        self.arguments_by_description.get(description)
    }

    /// Strategy options from the declaration.
    pub fn options(&self) -> &[StrategyOption] {
        &self.options
    }

    /// Value of the first option with the given key.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.as_str())
    }

    /// Set the audited-type tag; an empty tag means the default type.
    pub fn with_audited_type(mut self, audited_type: impl Into<String>) -> Self {
        let audited_type = audited_type.into();
        self.audited_type = if audited_type.is_empty() {
            DEFAULT_AUDITED_TYPE.to_string()
        } else {
            audited_type
        };
        self
    }

    /// Set the strategy options.
    pub fn with_options(mut self, options: Vec<StrategyOption>) -> Self {
        self.options = options;
        self
    }

    /// Run a named operation on the receiver.
    ///
    /// Best effort: a missing receiver, an unknown operation or a failing one
    /// is logged and yields `None`. Never panics or returns an error to the
    /// calling strategy.
    pub fn invoke_operation(&self, operation: &str, arguments: &[Value]) -> Option<Value> {
        let result = match self.receiver {
            Some(receiver) => receiver.invoke_operation(operation, arguments),
            None => Err(OperationError::NoReceiver {
                operation: operation.to_string(),
            }),
        };

        match result {
            Ok(value) => value,
            Err(error @ OperationError::Failed { .. }) => {
                warn!(method = %self.method, %error, "Invoking operation on the audited instance failed");
                None
            }
            Err(error) => {
                warn!(method = %self.method, %error, "Audited instance does not provide the invoked operation");
                None
            }
        }
    }
}

fn same_instance(a: &dyn AuditedInstance, b: &dyn AuditedInstance) -> bool {
    std::ptr::eq(
        a as *const _ as *const u8,
        b as *const _ as *const u8,
    )
}

impl PartialEq for AuditContext<'_> {
    fn eq(&self, other: &Self) -> bool {
        let same_receiver = match (self.receiver, other.receiver) {
            (None, None) => true,
            (Some(a), Some(b)) => same_instance(a, b),
            _ => false,
        };
        same_receiver
            && self.audited_type == other.audited_type
            && self.method == other.method
            && self.arguments == other.arguments
            && self.argument_annotations == other.argument_annotations
            && self.arguments_by_description == other.arguments_by_description
            && self.options == other.options
    }
}

impl fmt::Debug for AuditContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditContext")
            .field("audited_type", &self.audited_type)
            .field("method", &self.method.to_string())
            .field("receiver", &self.receiver.map(|r| r.instance_type()))
            .field("arguments", &self.arguments)
            .field("argument_annotations", &self.argument_annotations)
            .field("arguments_by_description", &self.arguments_by_description)
            .field("options", &self.options)
            .finish()
    }
}

/// Builds [`AuditContext`]s. Stateless; one instance can serve any number of
/// concurrent calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    /// Create a builder.
    pub fn new() -> Self {
        Self
    }

    /// Build the context for one call.
    ///
    /// `parameters` may be shorter than `arguments`; the extra arguments are
    /// kept positionally but carry no annotations. When two parameters share
    /// a description, the later argument wins in the description map.
    pub fn build<'r>(
        &self,
        method: MethodIdentity,
        receiver: Option<&'r dyn AuditedInstance>,
        arguments: Vec<Value>,
        parameters: &[ParameterDescriptor],
    ) -> AuditContext<'r> {
        let mut argument_annotations = BTreeMap::new();
        let mut arguments_by_description = HashMap::new();

        for (position, argument) in arguments.iter().enumerate() {
            let Some(descriptor) = parameters.get(position) else {
                continue;
            };
            argument_annotations.insert(position, descriptor.annotations());
            if let Some(label) = descriptor.label() {
                arguments_by_description.insert(label.to_string(), argument.clone());
            }
        }

        AuditContext {
            audited_type: DEFAULT_AUDITED_TYPE.to_string(),
            method,
            receiver,
            arguments,
            argument_annotations,
            arguments_by_description,
            options: Vec::new(),
        }
    }
}

/// Snapshot a call argument for the audit context.
///
/// Arguments that cannot be serialized are recorded as `null` and logged.
pub fn capture_argument<T: Serialize + ?Sized>(argument: &T) -> Value {
    serde_json::to_value(argument).unwrap_or_else(|e| {
        warn!(
            argument_type = std::any::type_name::<T>(),
            error = %e,
            "Audited argument could not be captured"
        );
        Value::Null
    })
}
