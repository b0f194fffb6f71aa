//! Prompt text per generation kind.

use super::GenerationKind;

pub const ASSEMBLY_SYSTEM_PROMPT: &str = "You are an expert in furniture assembly manuals.";

pub const DESCRIPTION_PROMPT: &str = "Describe the furniture assembly step shown in this manual diagram \
in 3-5 sentences: the procedure and the objects involved. \
Refer to labeled parts by their label; otherwise infer what each part is. \
Return only the description text.";

pub const TOOL_LIST_PROMPT: &str = "List the tools needed to complete the furniture assembly step shown \
in this manual diagram. Include a tool if it is labeled and shown; otherwise infer which tools, if any, \
the step requires. Include only tools, never parts. \
Return only JSON of the form {\"tools\": [\"tool 1\", \"tool 2\"]}.";

pub const CHECKLIST_PROMPT: &str = "Based on the following assembly step description, generate a concise \
checklist of 3-5 specific actions and verifications the user should perform. \
Each item is at most 15 words, actionable, and mixes practical steps with safety checks.\n\n\
Step description:\n{description}\n\n\
Return only JSON of the form {\"checklist\": [\"item 1\", \"item 2\", \"item 3\"]}.";

pub const ORIENTATION_SYSTEM_PROMPT: &str = "You compare two images of consecutive steps in an \
assembly workflow and decide whether the user must deliberately change the orientation of the \
workpiece between them.\n\
Only report user-actionable orientation changes: rotation (90 or 180 degrees), flipping or \
mirroring, portrait to landscape, or alignment changes that need user action.\n\
Ignore color, styling, annotations and content differences.\n\
Return a JSON object and nothing else.";

pub const ORIENTATION_PROMPT: &str = "Image A is the current step. Image B is the next step.\n\
If no orientation change is required, return {\"show_popup\": false, \"message\": \"\"}.\n\
If one is required, return {\"show_popup\": true, \"message\": \"<concise actionable guidance, at most 80 words>\"}.";

/// Token budget for the orientation call; the answer is a short JSON object.
pub const ORIENTATION_MAX_OUTPUT_TOKENS: u32 = 200;

/// `(system prompt, prompt)` for a text-model call.
pub fn for_kind(kind: GenerationKind, prior_text: Option<&str>) -> (&'static str, String) {
    match kind {
        GenerationKind::Description => (ASSEMBLY_SYSTEM_PROMPT, DESCRIPTION_PROMPT.to_string()),
        GenerationKind::ToolList => (ASSEMBLY_SYSTEM_PROMPT, TOOL_LIST_PROMPT.to_string()),
        GenerationKind::Checklist => (
            ASSEMBLY_SYSTEM_PROMPT,
            CHECKLIST_PROMPT.replace("{description}", prior_text.unwrap_or_default()),
        ),
        GenerationKind::OrientationCompare => {
            (ORIENTATION_SYSTEM_PROMPT, ORIENTATION_PROMPT.to_string())
        }
        // Image models take no prompt pair
        GenerationKind::ColorizeImage => ("", String::new()),
    }
}
