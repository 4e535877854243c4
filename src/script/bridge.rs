//! Passing values between templates and Lua.
//!
//! Lua tables and functions reach templates wrapped in [`ScriptValue`], so
//! handing them back to Lua returns the very same table. Everything else is
//! converted through serde.

use minijinja::{
    Value,
    value::{Enumerator, Object, ObjectRepr},
};
use mlua::{Lua, LuaSerdeExt, MultiValue, SerializeOptions, Table, Value as LuaValue};
use std::{fmt, sync::Arc};

/// Calling scripted functions from templates.
pub trait ScriptBridge {
    /// Resolve the dotted `name` from the globals and call it with `args`.
    ///
    /// A name that resolves to a non-function yields that value as is.
    fn invoke(&self, name: &str, args: &[Value]) -> mlua::Result<Value>;
}

impl ScriptBridge for Lua {
    fn invoke(&self, name: &str, args: &[Value]) -> mlua::Result<Value> {
        let result = match resolve(self, name)? {
            LuaValue::Function(f) => {
                let args = args
                    .iter()
                    .map(|arg| to_lua(self, arg))
                    .collect::<mlua::Result<Vec<_>>>()?;
                f.call::<LuaValue>(MultiValue::from_vec(args))?
            }
            other => other,
        };

        // scripted helpers produce markup; their text is not escaped again
        Ok(match result {
            LuaValue::String(s) => Value::from_safe_string(s.to_string_lossy().to_string()),
            other => to_template(other),
        })
    }
}

fn resolve(lua: &Lua, name: &str) -> mlua::Result<LuaValue> {
    let mut value = LuaValue::Table(lua.globals());
    for part in name.split('.') {
        value = match value {
            LuaValue::Table(table) => table.get(part)?,
            _ => {
                return Err(mlua::Error::runtime(format!(
                    "`{name}` does not resolve: `{part}` is looked up on a non-table"
                )));
            }
        };
    }
    Ok(value)
}

/// Lua value → template value.
pub fn to_template(value: LuaValue) -> Value {
    match value {
        LuaValue::Nil => Value::from(()),
        LuaValue::Boolean(b) => Value::from(b),
        LuaValue::Integer(n) => Value::from(n),
        LuaValue::Number(n) => Value::from(n),
        LuaValue::String(s) => Value::from(s.to_string_lossy().to_string()),
        value @ (LuaValue::Table(_) | LuaValue::Function(_)) => Value::from_object(ScriptValue(value)),
        _ => Value::UNDEFINED,
    }
}

/// Template value → Lua value.
pub fn to_lua(lua: &Lua, value: &Value) -> mlua::Result<LuaValue> {
    if let Some(script) = value.downcast_object_ref::<ScriptValue>() {
        return Ok(script.0.clone());
    }
    let options = SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false);
    lua.to_value_with(value, options)
}

// ============================================================================
// Script Value
// ============================================================================

/// A Lua table or function seen from a template.
///
/// Tables with a non-empty array part act as sequences (0-based), other
/// tables as maps with string keys.
#[derive(Debug, Clone)]
pub struct ScriptValue(LuaValue);

impl ScriptValue {
    fn table(&self) -> Option<&Table> {
        match &self.0 {
            LuaValue::Table(table) => Some(table),
            _ => None,
        }
    }

    fn is_seq(&self) -> bool {
        self.table().is_some_and(|t| t.raw_len() > 0)
    }
}

impl Object for ScriptValue {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        match self.table() {
            Some(_) if self.is_seq() => ObjectRepr::Seq,
            Some(_) => ObjectRepr::Map,
            None => ObjectRepr::Plain,
        }
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let table = self.table()?;
        let value: LuaValue = if self.is_seq() {
            table.get(key.as_i64()? + 1).ok()?
        } else {
            table.get(key.as_str()?).ok()?
        };
        match value {
            LuaValue::Nil => None,
            value => Some(to_template(value)),
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        let Some(table) = self.table() else {
            return Enumerator::NonEnumerable;
        };
        if self.is_seq() {
            return Enumerator::Seq(table.raw_len());
        }

        let mut keys: Vec<String> = table
            .pairs::<LuaValue, LuaValue>()
            .filter_map(Result::ok)
            .filter_map(|(key, _)| match key {
                LuaValue::String(s) => Some(s.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();
        keys.sort();
        Enumerator::Values(keys.into_iter().map(Value::from).collect())
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr() {
            ObjectRepr::Plain => f.write_str("<lua function>"),
            _ => {
                let items: Vec<String> = self
                    .try_iter_values()
                    .map(|value| value.to_string())
                    .collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl ScriptValue {
    fn try_iter_values(self: &Arc<Self>) -> impl Iterator<Item = Value> + '_ {
        let keys: Vec<Value> = match self.enumerate() {
            Enumerator::Seq(n) => (0..n).map(Value::from).collect(),
            Enumerator::Values(keys) => keys,
            _ => Vec::new(),
        };
        keys.into_iter().filter_map(|key| self.get_value(&key))
    }
}
