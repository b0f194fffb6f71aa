//! Built-in content shown while a step's real explanation is generated.

use std::collections::HashMap;

use once_cell::sync::Lazy;

const GENERIC_EXPLANATION: &str =
    "An explanation for this step is being prepared. Follow the diagram in the meantime.";

static EXPLANATIONS: Lazy<HashMap<i32, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            1,
            "Begin by placing the two long horizontal panels labeled 01 on a flat surface. \
             Insert the vertical panel labeled 02 into the slots on the horizontal panels. \
             Ensure the edges are aligned and the central partition is secured within the \
             grooves for stability.",
        ),
        (
            2,
            "Take the panel labeled 01 and align it with the previously assembled structure. \
             Using the tool A12, insert and tighten screws A13 into the side, securing the panel \
             in place. Repeat this process for the opposite side to ensure the panels are firmly \
             attached.",
        ),
    ])
});

static TOOLS: Lazy<HashMap<i32, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        (1, &["Rubber Mallet (optional)"][..]),
        (2, &["Allen Wrench (A13)"][..]),
    ])
});

pub fn explanation(step_number: i32) -> String {
    EXPLANATIONS
        .get(&step_number)
        .copied()
        .unwrap_or(GENERIC_EXPLANATION)
        .to_string()
}

pub fn tools(step_number: i32) -> Vec<String> {
    TOOLS
        .get(&step_number)
        .map(|tools| tools.iter().map(|t| t.to_string()).collect())
        .unwrap_or_default()
}
