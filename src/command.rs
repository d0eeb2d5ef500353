//! Command text synthesis.
//!
//! The driver has no native output-parameter channel, so output parameters and
//! procedure return codes are declared as local variables and read back through
//! a trailing `SELECT`.

use crate::coercion::cast_parameter;
use crate::params::Parameters;
use crate::results::RETURN_FIELD;
use crate::types::RowValues;

/// How the materializer treats a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Caller text wrapped with parameter declarations. `trailing_output` is set when
    /// the last recordset is the output-parameter projection.
    Direct { trailing_output: bool },
    /// Hand-built text (procedure calls) whose last recordset is the return projection.
    NestedOutputProjection,
}

impl ExecutionMode {
    /// Whether the last recordset must be consumed as output values.
    #[must_use]
    pub fn has_trailing_projection(self) -> bool {
        match self {
            ExecutionMode::Direct { trailing_output } => trailing_output,
            ExecutionMode::NestedOutputProjection => true,
        }
    }
}

/// Command text plus bind values in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedCommand {
    pub text: String,
    pub binds: Vec<RowValues>,
    pub mode: ExecutionMode,
}

impl SynthesizedCommand {
    /// A command executed as-is with no parameters.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            binds: Vec::new(),
            mode: ExecutionMode::Direct {
                trailing_output: false,
            },
        }
    }
}

fn quote_alias(name: &str) -> String {
    name.replace('\'', "''")
}

fn input_binds(params: &Parameters) -> Vec<RowValues> {
    params
        .inputs()
        .map(|p| cast_parameter(p.value.clone(), p.sql_type))
        .collect()
}

/// Wrap `command` with declarations for `params`.
///
/// ```rust
/// use mssql_request::prelude::*;
/// use mssql_request::command::synthesize_query;
///
/// let mut params = Parameters::new();
/// params.add(Parameter::input("id", SqlType::Int, RowValues::Int(5)));
/// let cmd = synthesize_query("SELECT * FROM t WHERE id = @id", &params);
/// assert_eq!(cmd.text, "DECLARE @id int;SET @id = ?;SELECT * FROM t WHERE id = @id;");
/// assert_eq!(cmd.binds, vec![RowValues::Int(5)]);
/// ```
#[must_use]
pub fn synthesize_query(command: &str, params: &Parameters) -> SynthesizedCommand {
    if params.is_empty() {
        return SynthesizedCommand::plain(command);
    }

    let declarations: Vec<String> = params.iter().map(|p| p.declaration()).collect();
    let mut text = format!("DECLARE {};", declarations.join(", "));
    for p in params.inputs() {
        text.push_str(&format!("SET @{} = ?;", p.name));
    }
    text.push_str(command.trim_end_matches(';'));
    text.push(';');

    let trailing_output = params.has_outputs();
    if trailing_output {
        let projection: Vec<String> = params
            .outputs()
            .map(|p| format!("@{} as '{}'", p.name, quote_alias(&p.name)))
            .collect();
        text.push_str(&format!("SELECT {};", projection.join(", ")));
    }

    SynthesizedCommand {
        text,
        binds: input_binds(params),
        mode: ExecutionMode::Direct { trailing_output },
    }
}

/// Build the `EXEC` batch for a stored procedure call.
#[must_use]
pub fn synthesize_procedure(procedure: &str, params: &Parameters) -> SynthesizedCommand {
    let mut declarations = vec![format!("@{RETURN_FIELD} int")];
    declarations.extend(params.outputs().map(|p| p.declaration()));

    let arguments: Vec<String> = params
        .iter()
        .map(|p| {
            if p.is_output() {
                format!("@{0}=@{0} output", p.name)
            } else {
                format!("@{}=?", p.name)
            }
        })
        .collect();

    let mut projection = vec![format!("@{RETURN_FIELD} as '{RETURN_FIELD}'")];
    projection.extend(
        params
            .outputs()
            .map(|p| format!("@{} as '{}'", p.name, quote_alias(&p.name))),
    );

    let mut text = format!(
        "DECLARE {};EXEC @{RETURN_FIELD} = {procedure}",
        declarations.join(", ")
    );
    if !arguments.is_empty() {
        text.push(' ');
        text.push_str(&arguments.join(", "));
    }
    text.push_str(&format!(";SELECT {};", projection.join(", ")));

    SynthesizedCommand {
        text,
        binds: input_binds(params),
        mode: ExecutionMode::NestedOutputProjection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameter;
    use crate::types::SqlType;

    #[test]
    fn outputs_add_trailing_projection() {
        let mut params = Parameters::new();
        params.add(Parameter::input("a", SqlType::NVarChar, RowValues::Int(7)).with_length(10));
        params.add(Parameter::output("b", SqlType::Int));
        params.add(Parameter::input("c", SqlType::VarBinary, RowValues::Null));

        let cmd = synthesize_query("EXEC dbo.work @a, @b OUTPUT, @c", &params);
        assert_eq!(
            cmd.text,
            "DECLARE @a nvarchar(10), @b int, @c varbinary(MAX);SET @a = ?;SET @c = ?;\
             EXEC dbo.work @a, @b OUTPUT, @c;SELECT @b as 'b';"
        );
        assert_eq!(
            cmd.binds,
            vec![RowValues::Text("7".into()), RowValues::Blob(Vec::new())]
        );
        assert_eq!(cmd.mode, ExecutionMode::Direct { trailing_output: true });
    }

    #[test]
    fn no_parameters_leaves_text_untouched() {
        let cmd = synthesize_query("SELECT 1", &Parameters::new());
        assert_eq!(cmd.text, "SELECT 1");
        assert!(cmd.binds.is_empty());
        assert!(!cmd.mode.has_trailing_projection());
    }

    #[test]
    fn procedure_without_parameters() {
        let cmd = synthesize_procedure("dbo.ping", &Parameters::new());
        assert_eq!(
            cmd.text,
            "DECLARE @___return___ int;EXEC @___return___ = dbo.ping;\
             SELECT @___return___ as '___return___';"
        );
        assert_eq!(cmd.mode, ExecutionMode::NestedOutputProjection);
    }
}
