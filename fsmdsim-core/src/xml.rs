//! XML documents, as written for the classic FSMD tools.
//!
//! ```xml
//! <fsmddescription>
//!   <statelist><state>INIT</state><state>DONE</state></statelist>
//!   <initialstate>INIT</initialstate>
//!   <inputlist><input>in_A</input></inputlist>
//!   <variablelist><variable>var_A</variable></variablelist>
//!   <operationlist>
//!     <operation><name>load</name><expression>var_A = in_A</expression></operation>
//!   </operationlist>
//!   <conditionlist>
//!     <condition><name>pos</name><expression>var_A &gt; 0</expression></condition>
//!   </conditionlist>
//!   <fsmd>
//!     <INIT>
//!       <transition><condition>true</condition><instruction>load</instruction><nextstate>DONE</nextstate></transition>
//!     </INIT>
//!   </fsmd>
//! </fsmddescription>
//! ```
//!
//! A stimulus is an `fsmdstimulus` element holding `setinput` entries
//! (`cycle`, `expression`) and an optional `endstate`. Both decode into the
//! same raw types as the JSON and YAML forms.

use crate::definition::{DescriptionRaw, NamedExpression, OneOrManyTransitions, TransitionRaw};
use crate::error::CoreError;
use crate::operation::Instruction;
use crate::stimulus::{SetInputRaw, StimulusRaw};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct XmlDescription {
    statelist: StateList,
    initialstate: String,
    #[serde(default)]
    inputlist: InputList,
    #[serde(default)]
    variablelist: VariableList,
    #[serde(default)]
    operationlist: OperationList,
    #[serde(default)]
    conditionlist: ConditionList,
    #[serde(default)]
    fsmd: BTreeMap<String, TransitionList>,
}

#[derive(Debug, Default, Deserialize)]
struct StateList {
    #[serde(default)]
    state: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InputList {
    #[serde(default)]
    input: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VariableList {
    #[serde(default)]
    variable: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OperationList {
    #[serde(default)]
    operation: Vec<NamedExpression>,
}

#[derive(Debug, Default, Deserialize)]
struct ConditionList {
    #[serde(default)]
    condition: Vec<NamedExpression>,
}

#[derive(Debug, Default, Deserialize)]
struct TransitionList {
    #[serde(default)]
    transition: Vec<XmlTransition>,
}

#[derive(Debug, Deserialize)]
struct XmlTransition {
    condition: String,
    #[serde(default)]
    instruction: String,
    nextstate: String,
}

#[derive(Debug, Deserialize)]
struct XmlStimulus {
    #[serde(default)]
    setinput: Vec<XmlSetInput>,
    #[serde(default)]
    endstate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlSetInput {
    #[serde(default)]
    cycle: Option<String>,
    #[serde(default)]
    expression: Option<String>,
}

/// Empty elements carry no value.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

pub(crate) fn description_from_str(text: &str) -> Result<DescriptionRaw, CoreError> {
    let doc: XmlDescription = quick_xml::de::from_str(text)?;

    let fsmd = doc
        .fsmd
        .into_iter()
        .map(|(state, list)| {
            let transitions = list
                .transition
                .into_iter()
                .map(|t| TransitionRaw {
                    condition: t.condition,
                    instruction: Instruction::parse(&t.instruction),
                    nextstate: t.nextstate,
                })
                .collect();
            (state, OneOrManyTransitions(transitions))
        })
        .collect();

    Ok(DescriptionRaw {
        states: doc.statelist.state,
        initial: doc.initialstate,
        inputs: doc.inputlist.input,
        variables: doc.variablelist.variable,
        operations: doc.operationlist.operation,
        conditions: doc.conditionlist.condition,
        fsmd,
    })
}

pub(crate) fn stimulus_from_str(text: &str) -> Result<StimulusRaw, CoreError> {
    let doc: XmlStimulus = quick_xml::de::from_str(text)?;

    let setinput = doc
        .setinput
        .into_iter()
        .map(|entry| SetInputRaw {
            cycle: non_empty(entry.cycle)
                .map(serde_json::Value::String)
                .unwrap_or_default(),
            expression: non_empty(entry.expression),
        })
        .collect();

    Ok(StimulusRaw {
        setinput,
        endstate: non_empty(doc.endstate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_lists() {
        let raw = description_from_str(
            r#"<fsmddescription>
                <statelist><state>A</state><state>B</state></statelist>
                <initialstate>A</initialstate>
                <inputlist><input>go</input></inputlist>
                <variablelist><variable>n</variable><variable>m</variable></variablelist>
                <operationlist>
                    <operation><name>inc</name><expression>n = n + 1</expression></operation>
                    <operation><name>copy</name><expression>m = n</expression></operation>
                </operationlist>
                <conditionlist>
                    <condition><name>small</name><expression>n &lt; 3</expression></condition>
                </conditionlist>
                <fsmd>
                    <A>
                        <transition><condition>go == 1</condition><instruction>inc copy</instruction><nextstate>B</nextstate></transition>
                        <transition><condition>1</condition><instruction>NOP</instruction><nextstate>A</nextstate></transition>
                    </A>
                    <B>
                        <transition><condition>small</condition><instruction>inc</instruction><nextstate>B</nextstate></transition>
                    </B>
                </fsmd>
            </fsmddescription>"#,
        )
        .unwrap();

        assert_eq!(raw.states, vec!["A", "B"]);
        assert_eq!(raw.initial, "A");
        assert_eq!(raw.inputs, vec!["go"]);
        assert_eq!(raw.variables, vec!["n", "m"]);
        assert_eq!(raw.operations.len(), 2);
        assert_eq!(raw.conditions[0].expression, "n < 3");

        let a = &raw.fsmd["A"].0;
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].instruction.0, vec!["inc", "copy"]);
        assert_eq!(a[1].condition, "1");
        assert_eq!(raw.fsmd["B"].0.len(), 1);
    }

    #[test]
    fn test_empty_lists() {
        let raw = description_from_str(
            r#"<fsmddescription>
                <statelist><state>ONLY</state></statelist>
                <initialstate>ONLY</initialstate>
                <inputlist></inputlist>
                <variablelist/>
                <operationlist/>
                <conditionlist/>
                <fsmd>
                    <ONLY>
                        <transition><condition>true</condition><instruction>NOP</instruction><nextstate>ONLY</nextstate></transition>
                    </ONLY>
                </fsmd>
            </fsmddescription>"#,
        )
        .unwrap();

        assert_eq!(raw.states, vec!["ONLY"]);
        assert!(raw.inputs.is_empty());
        assert!(raw.variables.is_empty());
        assert!(raw.operations.is_empty());
        assert!(raw.conditions.is_empty());
        assert_eq!(raw.fsmd["ONLY"].0.len(), 1);
    }

    #[test]
    fn test_stimulus() {
        let raw = stimulus_from_str(
            r#"<fsmdstimulus>
                <setinput><cycle>0</cycle><expression>in_A = 12</expression></setinput>
                <setinput><cycle>3</cycle><expression>in_B = 8</expression></setinput>
                <endstate>FINISH</endstate>
            </fsmdstimulus>"#,
        )
        .unwrap();

        assert_eq!(raw.setinput.len(), 2);
        assert_eq!(raw.setinput[1].cycle, serde_json::json!("3"));
        assert_eq!(raw.setinput[1].expression.as_deref(), Some("in_B = 8"));
        assert_eq!(raw.endstate.as_deref(), Some("FINISH"));
    }

    #[test]
    fn test_stimulus_without_end_state() {
        let raw = stimulus_from_str(
            "<fsmdstimulus><setinput><cycle>1</cycle><expression>x = 1</expression></setinput></fsmdstimulus>",
        )
        .unwrap();
        assert_eq!(raw.setinput.len(), 1);
        assert!(raw.endstate.is_none());
    }

    #[test]
    fn test_malformed_xml() {
        let err = description_from_str("<fsmddescription><statelist>").unwrap_err();
        assert!(matches!(err, CoreError::Xml(_)));
        assert!(err.is_load_error());
    }
}
