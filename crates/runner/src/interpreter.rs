//! Result interpretation for each supported framework dialect
//!
//! | framework | passed iff                                  |
//! |-----------|---------------------------------------------|
//! | jasmine   | `passed` is `true`                          |
//! | qunit     | `total` is defined and `passed == total`    |
//! | mocha     | `failures == 0`                             |
//! | YUI Test  | `total` is defined and `passed == total`    |
//! | custom    | `failed == 0`                               |

use serde_json::Value;

use saucejs_common::Framework;

use crate::error::RunResult;

/// Decide whether a raw result payload reports that every test passed
pub fn interpret(framework: Framework, raw: &Value) -> bool {
    match framework {
        Framework::Jasmine => raw.get("passed").and_then(Value::as_bool) == Some(true),
        Framework::Qunit | Framework::YuiTest => match (number(raw, "passed"), number(raw, "total")) {
            (Some(passed), Some(total)) => passed == total,
            _ => false,
        },
        Framework::Mocha => number(raw, "failures") == Some(0.0),
        Framework::Custom => number(raw, "failed") == Some(0.0),
    }
}

/// Same as [`interpret`] for a framework given by name
pub fn interpret_named(framework: &str, raw: &Value) -> RunResult<bool> {
    let framework: Framework = framework.parse()?;
    Ok(interpret(framework, raw))
}

fn number(raw: &Value, key: &str) -> Option<f64> {
    raw.get(key).and_then(Value::as_f64)
}
