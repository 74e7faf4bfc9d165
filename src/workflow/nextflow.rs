//! Nextflow Rendering
//!
//! Turns a validated [`ReleaseWorkflow`] into Nextflow (DSL1) source. Each
//! process consumes the previous process's flag channel and emits its own,
//! which is how the engine learns the stage order.

use super::model::{ReleaseWorkflow, WorkflowProcess};

/// First line of every generated workflow file.
pub const NEXTFLOW_HEADER: &str = "#!/usr/bin/env nextflow";

/// Renders the whole workflow file.
pub fn render_nextflow(workflow: &ReleaseWorkflow) -> String {
    let mut output = String::from(NEXTFLOW_HEADER);
    output.push('\n');

    for process in &workflow.processes {
        output.push_str(&render_process(process));
        output.push('\n');
    }

    output
}

/// Escapes text for a triple-quoted Groovy string, where `$` starts an
/// interpolation and `\` starts an escape.
pub fn groovy_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '$' | '"') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Renders one process block.
pub fn render_process(process: &WorkflowProcess) -> String {
    format!(
        r#"
process {name} {{
    memory='{memory} GB'
    input:
        val flag from {input}
    output:
        val true into {output}
    script:
    """
    {script}
    """
}}
"#,
        name = process.name,
        memory = process.memory_gb,
        input = process.input_flag,
        output = process.output_flag,
        script = groovy_escape(&process.command.script_line()),
    )
}
