// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The Type Oracle: a read-only, pure, synchronous interface over a FHIR
//! StructureDefinition-backed type registry. The translator only asks it
//! questions; it never owns or loads StructureDefinitions itself.

/// Element-type/cardinality/classification metadata for a canonical type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMetadata {
    /// Whether the type is a FHIR primitive (`string`, `integer`, ...).
    pub is_primitive: bool,
    /// Whether the type is a FHIR complex type (`Quantity`, `HumanName`, ...).
    pub is_complex: bool,
    /// Whether the type is a FHIR resource (`Patient`, `Observation`, ...).
    pub is_resource: bool,
    /// The base type this type derives from, if any.
    pub base_type: Option<String>,
}

/// The structural fields that discriminate a complex type when checking
/// `is`/matching polymorphic variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDiscriminator {
    /// Fields that must exist for a JSON object to be this type.
    pub required_fields: Vec<String>,
}

/// Read-only oracle over the FHIR type system, consulted by the translator
/// for path typing, polymorphic property resolution, and array cardinality.
/// Implementations are expected to be pure and safely shareable across
/// translator instances (the translator never mutates anything it learns
/// from the oracle).
pub trait TypeOracle: Send + Sync {
    /// Resolve a (possibly abbreviated or aliased) type name to its
    /// canonical FHIR type name, if known.
    fn canonical_type_name(&self, name: &str) -> Option<String>;

    /// Classification metadata for a canonical type name.
    fn type_metadata(&self, canonical: &str) -> Option<TypeMetadata>;

    /// The FHIR type of `parent_type`'s element at `path` (dotted,
    /// relative to `parent_type`), if resolvable.
    fn element_type(&self, parent_type: &str, path: &str) -> Option<String>;

    /// Whether `parent_type`'s element at `path` has array (0..* / 1..*)
    /// cardinality. Returns `false` when cardinality can't be determined —
    /// callers treat that as "assume not an array" (see `Context::json_path`).
    fn is_array_element(&self, parent_type: &str, path: &str) -> bool;

    /// The list of concrete variant type names for a polymorphic `value[x]`-
    /// style property (e.g. `["Quantity", "String", "CodeableConcept", ...]`
    /// for `Observation.value`), or `None` if `base` isn't polymorphic.
    fn resolve_polymorphic_property(&self, base: &str) -> Option<Vec<String>>;

    /// The concrete field name for a polymorphic property resolved to a
    /// specific type (e.g. `("value", "Quantity") -> "valueQuantity"`).
    fn resolve_polymorphic_field_for_type(&self, base: &str, target_type: &str) -> Option<String>;

    /// The structural discriminator fields for a canonical complex type,
    /// used by `is`/`as` structural checks.
    fn type_discriminator(&self, canonical: &str) -> Option<TypeDiscriminator>;
}

/// `Age` and `Duration` are FHIR type aliases over `Quantity` for the
/// purposes of polymorphic `value[x]` matching (spec §4.5, §9). The
/// translator consults this narrow alias table directly rather than
/// pattern-matching arbitrary variant names.
pub fn quantity_aliased_type(target_type: &str) -> &str {
    match target_type {
        "Age" | "Duration" => "Quantity",
        other => other,
    }
}

/// Fallback heuristic for `_is_primitive_collection` when the oracle can't
/// answer (spec §9 Open Questions: preserve the heuristic *and* the
/// "prefer StructureDefinition" precedence order — this list is consulted
/// only after `TypeOracle::element_type`/`is_array_element` come back
/// uninformative). Field names here are known, from the base FHIR
/// resources, to hold arrays of primitive (string-like) values rather than
/// complex objects.
pub const PRIMITIVE_COLLECTION_HINTS: &[&str] = &[
    "given", "line", "prefix", "suffix", "target", "note", "instruction", "category",
];

/// Whether `field_name` is a known-primitive-collection field per the
/// hardcoded heuristic, for use only when the oracle has no answer.
pub fn is_primitive_collection_heuristic(field_name: &str) -> bool {
    PRIMITIVE_COLLECTION_HINTS.contains(&field_name)
}
