//! Allow-list of callable methods.
//!
//! Registry is built once from a static table. A method is reachable over RPC only if it is
//! registered as exposed, any other name (internal helper or unknown) is refused.

use crate::bridge::session::Session;
use crate::error::Error;
use crate::rpc::methods;
use crate::rpc::protocol::Params;
use crate::sync_debug;
use indexmap::IndexMap;
use serde_json::Value;

pub type Handler = fn(&MethodRegistry, &mut Session, Params<'_>) -> Result<Value, Error>;

/// Registry entry.
pub struct Registration {
    /// Primary name and aliases.
    pub names: &'static [&'static str],
    /// Whether the method may be called through RPC.
    pub exposed: bool,
    pub help: &'static str,
    pub handler: Handler,
}

static METHODS: &[Registration] = &[
    Registration {
        names: &["shutdown"],
        exposed: true,
        help: "shutdown() => 0\nCleanly shutdown the RPC service.",
        handler: methods::shutdown,
    },
    Registration {
        names: &["version"],
        exposed: true,
        help: "version() => [tool, version]\nReturn the tool used and its version.",
        handler: methods::version,
    },
    Registration {
        names: &["jump"],
        exposed: true,
        help: "jump(address) => bool\nMove the view focus to `address`.\nExample: jump 0x4049de",
        handler: methods::jump,
    },
    Registration {
        names: &["makecomm", "comment"],
        exposed: true,
        help: "makecomm(address, comment) => bool\nAdd a comment at `address`.\nExample: makecomm 0x40000 \"Important call here!\"",
        handler: methods::comment,
    },
    Registration {
        names: &["setcolor"],
        exposed: true,
        help: "setcolor(address [, color]) => bool\nHighlight `address` with `color` (0xRRGGBB, red by default).\nExample: setcolor 0x40000 0xff0000",
        handler: methods::set_color,
    },
    Registration {
        names: &["sync", "synchronize"],
        exposed: true,
        help: "sync(offset, added, removed) => [added, removed]\nSynchronize the current instruction and breakpoints with the debugger. \
               Not intended to be called by hand.",
        handler: methods::synchronize,
    },
    Registration {
        names: &["system.listMethods"],
        exposed: true,
        help: "system.listMethods() => [name]\nList exposed methods.",
        handler: methods::list_methods,
    },
    Registration {
        names: &["system.methodHelp"],
        exposed: true,
        help: "system.methodHelp(name) => string\nReturn help of an exposed method.",
        handler: methods::method_help,
    },
    Registration {
        names: &["_add_breakpoint"],
        exposed: false,
        help: "_add_breakpoint(address) => bool\nSet a breakpoint at `address` from the disassembler side.",
        handler: methods::add_breakpoint,
    },
    Registration {
        names: &["_delete_breakpoint"],
        exposed: false,
        help: "_delete_breakpoint(address) => bool\nDelete a breakpoint at `address` from the disassembler side.",
        handler: methods::delete_breakpoint,
    },
];

pub struct MethodRegistry {
    methods: IndexMap<&'static str, &'static Registration>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        let methods = METHODS
            .iter()
            .flat_map(|reg| reg.names.iter().map(move |name| (*name, reg)))
            .collect();
        Self { methods }
    }

    /// Count of registered names (aliases included).
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn is_exposed(&self, method: &str) -> bool {
        self.methods.get(method).is_some_and(|reg| reg.exposed)
    }

    /// Exposed, non internal method names in registration order.
    pub fn list_exposed_methods(&self) -> Vec<&'static str> {
        self.methods
            .iter()
            .filter(|(name, reg)| reg.exposed && !name.starts_with('_'))
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn method_help(&self, method: &str) -> Result<&'static str, Error> {
        self.exposed(method).map(|(_, reg)| reg.help)
    }

    /// Call an exposed method. Any other name fails with [`Error::MethodNotExposed`].
    pub fn dispatch(
        &self,
        session: &mut Session,
        method: &str,
        params: &[Value],
    ) -> Result<Value, Error> {
        let (name, reg) = self.exposed(method)?;
        sync_debug!(target: "rpc", "executing {name}({})", Value::from(params.to_vec()));
        (reg.handler)(self, session, Params::new(name, params))
    }

    /// Call a registered method from inside the host process, internal methods included.
    pub fn invoke_local(
        &self,
        session: &mut Session,
        method: &str,
        params: &[Value],
    ) -> Result<Value, Error> {
        let (&name, &reg) = self
            .methods
            .get_key_value(method)
            .ok_or_else(|| Error::MethodNotExposed(method.to_string()))?;
        (reg.handler)(self, session, Params::new(name, params))
    }

    fn exposed(&self, method: &str) -> Result<(&'static str, &'static Registration), Error> {
        match self.methods.get_key_value(method) {
            Some((&name, &reg)) if reg.exposed => Ok((name, reg)),
            _ => Err(Error::MethodNotExposed(method.to_string())),
        }
    }
}
