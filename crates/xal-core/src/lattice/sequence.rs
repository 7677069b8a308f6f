use super::element::Element;
use crate::common::constants::LENGTH_EPSILON;
use crate::domain::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Serialized form of a lattice: explicit elements plus an optional total length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatticeSpec {
    pub id: String,
    /// Sequence length in m; a trailing drift closes the gap after the last element.
    #[serde(default)]
    pub length: Option<f64>,
    pub elements: Vec<Element>,
}

/// Validated, position-ordered element sequence starting at s = 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lattice {
    id: String,
    length: f64,
    elements: Vec<Element>,
}

impl Lattice {
    pub fn new(id: impl Into<String>, elements: Vec<Element>) -> ModelResult<Self> {
        Self::build(id.into(), elements, None)
    }

    pub fn with_length(
        id: impl Into<String>,
        elements: Vec<Element>,
        length: f64,
    ) -> ModelResult<Self> {
        Self::build(id.into(), elements, Some(length))
    }

    pub fn from_spec(spec: LatticeSpec) -> ModelResult<Self> {
        Self::build(spec.id, spec.elements, spec.length)
    }

    fn build(id: String, mut elements: Vec<Element>, length: Option<f64>) -> ModelResult<Self> {
        if elements.is_empty() {
            return Err(ModelError::construction(
                "LATTICE.EMPTY",
                format!("lattice '{id}' has no elements"),
            ));
        }

        let mut seen = BTreeSet::new();
        for element in &elements {
            element.validate()?;
            if !seen.insert(element.id.as_str()) {
                return Err(ModelError::construction(
                    "LATTICE.DUPLICATE_ID",
                    format!("lattice '{id}' contains element id '{}' twice", element.id),
                ));
            }
        }

        elements.sort_by(|left, right| left.entrance().total_cmp(&right.entrance()));

        if elements[0].entrance() < -LENGTH_EPSILON {
            return Err(ModelError::construction(
                "LATTICE.NEGATIVE_POSITION",
                format!(
                    "element '{}' starts before the sequence origin at {}",
                    elements[0].id,
                    elements[0].entrance()
                ),
            ));
        }

        let mut sequence = Vec::with_capacity(elements.len() * 2);
        let mut cursor = 0.0;
        let mut previous_id = String::from("start");
        for element in elements {
            let gap = element.entrance() - cursor;
            if gap < -LENGTH_EPSILON {
                return Err(ModelError::construction(
                    "LATTICE.OVERLAP",
                    format!(
                        "element '{}' overlaps '{previous_id}' by {:.3e} m",
                        element.id, -gap
                    ),
                ));
            }
            if gap > LENGTH_EPSILON {
                sequence.push(implicit_drift(&previous_id, &element.id, cursor, gap));
            }
            cursor = cursor.max(element.exit());
            previous_id.clone_from(&element.id);
            sequence.push(element);
        }

        let total_length = match length {
            Some(length) => {
                if !length.is_finite() || length < cursor - LENGTH_EPSILON {
                    return Err(ModelError::construction(
                        "LATTICE.LENGTH",
                        format!(
                            "lattice '{id}' length {length} is shorter than its elements ({cursor})"
                        ),
                    ));
                }
                let gap = length - cursor;
                if gap > LENGTH_EPSILON {
                    sequence.push(implicit_drift(&previous_id, "end", cursor, gap));
                }
                length
            }
            None => cursor,
        };

        let mut ids = BTreeSet::new();
        if let Some(clash) = sequence
            .iter()
            .find(|element| !ids.insert(element.id.as_str()))
        {
            return Err(ModelError::construction(
                "LATTICE.DUPLICATE_ID",
                format!(
                    "lattice '{id}' element id '{}' collides with a generated drift",
                    clash.id
                ),
            ));
        }

        debug!(
            lattice = %id,
            elements = sequence.len(),
            length = total_length,
            "lattice assembled"
        );

        Ok(Self {
            id,
            length: total_length,
            elements: sequence,
        })
    }

    /// Copy with the element list replaced; positions and ids must be unchanged.
    pub(crate) fn with_elements(&self, elements: Vec<Element>) -> Self {
        Self {
            id: self.id.clone(),
            length: self.length,
            elements,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|element| element.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.elements.iter().position(|element| element.id == id)
    }
}

fn implicit_drift(previous: &str, next: &str, entrance: f64, length: f64) -> Element {
    Element::drift(
        format!("drift:{previous}:{next}"),
        entrance + length / 2.0,
        length,
    )
}

#[cfg(test)]
mod tests {
    use super::{Lattice, LatticeSpec};
    use crate::domain::ModelErrorKind;
    use crate::lattice::{Element, ElementKind};

    #[test]
    fn elements_are_sorted_and_gaps_filled_with_drifts() {
        let lattice = Lattice::new(
            "test",
            vec![
                Element::quadrupole("Q2", 3.0, 0.2, -5.0),
                Element::quadrupole("Q1", 1.0, 0.2, 5.0),
                Element::marker("M1", 2.0),
            ],
        )
        .expect("lattice");

        let ids: Vec<&str> = lattice.elements().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "drift:start:Q1",
                "Q1",
                "drift:Q1:M1",
                "M1",
                "drift:M1:Q2",
                "Q2"
            ]
        );
        assert!((lattice.length() - 3.1).abs() < 1.0e-12);
        let leading = &lattice.elements()[0];
        assert!(matches!(leading.kind, ElementKind::Drift));
        assert!((leading.length - 0.9).abs() < 1.0e-12);
        assert_eq!(lattice.index_of("M1"), Some(3));
    }

    #[test]
    fn overlapping_elements_are_rejected() {
        let error = Lattice::new(
            "overlap",
            vec![
                Element::quadrupole("Q1", 1.0, 0.4, 5.0),
                Element::quadrupole("Q2", 1.3, 0.4, -5.0),
            ],
        )
        .expect_err("overlap");
        assert_eq!(error.kind(), ModelErrorKind::Construction);
        assert_eq!(error.placeholder(), "LATTICE.OVERLAP");
    }

    #[test]
    fn duplicate_ids_and_empty_sequences_are_rejected() {
        let error = Lattice::new(
            "dup",
            vec![Element::marker("M", 0.0), Element::marker("M", 1.0)],
        )
        .expect_err("duplicate");
        assert_eq!(error.placeholder(), "LATTICE.DUPLICATE_ID");

        let error = Lattice::new(
            "shadow",
            vec![
                Element::marker("M", 0.0),
                Element::quadrupole("Q1", 1.0, 0.2, 5.0),
                Element::marker("drift:M:Q1", 2.0),
            ],
        )
        .expect_err("user id shadows a generated drift");
        assert_eq!(error.placeholder(), "LATTICE.DUPLICATE_ID");
        assert!(error.message().contains("drift:M:Q1"));

        let error = Lattice::new("empty", Vec::new()).expect_err("empty");
        assert_eq!(error.placeholder(), "LATTICE.EMPTY");
    }

    #[test]
    fn declared_length_appends_trailing_drift() {
        let spec: LatticeSpec = serde_json::from_str(
            r#"{ "id": "ring", "length": 10.0,
                 "elements": [ { "id": "QF", "position": 0.5, "length": 1.0,
                                 "type": "quadrupole", "gradient": 1.0 } ] }"#,
        )
        .expect("spec json");
        let lattice = Lattice::from_spec(spec).expect("lattice");
        assert_eq!(lattice.len(), 2);
        assert!((lattice.elements()[1].length - 9.0).abs() < 1.0e-12);

        let error = Lattice::with_length("short", vec![Element::drift("D", 1.0, 2.0)], 1.0)
            .expect_err("too short");
        assert_eq!(error.placeholder(), "LATTICE.LENGTH");
    }
}
