//! Profile-based feature gating
//!
//! Janus exposes its feature set progressively through named profiles,
//! totally ordered from the minimal teaching core up to the full-capability
//! tier. Every feature, operator and primitive type carries a minimum
//! required profile. Checks *record* violations instead of failing fast, so
//! one pass over a unit surfaces every violation at once.

use crate::ast::{BinaryOp, UnaryOp};
use crate::common::Span;
use crate::sema::types::PrimitiveKind;
use std::fmt;

/// The progressive capability tiers, ordered by rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Profile {
    #[default]
    Core,
    Service,
    Cluster,
    Compute,
    Sovereign,
}

impl Profile {
    pub const ALL: [Profile; 5] = [
        Self::Core,
        Self::Service,
        Self::Cluster,
        Self::Compute,
        Self::Sovereign,
    ];

    pub fn rank(self) -> u8 {
        match self {
            Self::Core => 0,
            Self::Service => 1,
            Self::Cluster => 2,
            Self::Compute => 3,
            Self::Sovereign => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Service => "service",
            Self::Cluster => "cluster",
            Self::Compute => "compute",
            Self::Sovereign => "sovereign",
        }
    }

    /// Resolve a canonical or legacy profile name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "core" | "learning" => Some(Self::Core),
            "service" | "standard" => Some(Self::Service),
            "cluster" | "distributed" => Some(Self::Cluster),
            "compute" | "accelerated" => Some(Self::Compute),
            "sovereign" | "full" => Some(Self::Sovereign),
            _ => None,
        }
    }

    /// Whether this profile includes everything `required` demands
    pub fn includes(self, required: Profile) -> bool {
        self >= required
    }

    /// The structural limits enforced on top of the per-feature table
    pub fn restriction(self) -> &'static TypeRestriction {
        match self {
            Self::Core => &CORE_RESTRICTION,
            Self::Service => &SERVICE_RESTRICTION,
            Self::Cluster => &CLUSTER_RESTRICTION,
            Self::Compute => &COMPUTE_RESTRICTION,
            Self::Sovereign => &SOVEREIGN_RESTRICTION,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Gated language features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Variables,
    Functions,
    Arithmetic,
    ControlFlow,
    ForLoops,
    MatchStatements,
    Arrays,
    Ranges,
    Slices,
    Structs,
    Enums,
    Optionals,
    ErrorUnions,
    Allocators,
    Generics,
    ContextBounds,
    Actors,
    Tensors,
    NpuOffload,
    RawPointers,
    Effects,
}

impl Feature {
    pub fn name(self) -> &'static str {
        match self {
            Self::Variables => "variables",
            Self::Functions => "functions",
            Self::Arithmetic => "arithmetic",
            Self::ControlFlow => "control flow",
            Self::ForLoops => "for loops",
            Self::MatchStatements => "match statements",
            Self::Arrays => "arrays",
            Self::Ranges => "ranges",
            Self::Slices => "slices",
            Self::Structs => "structs",
            Self::Enums => "enums",
            Self::Optionals => "optionals",
            Self::ErrorUnions => "error unions",
            Self::Allocators => "allocators",
            Self::Generics => "generics",
            Self::ContextBounds => "context bounds",
            Self::Actors => "actors",
            Self::Tensors => "tensors",
            Self::NpuOffload => "npu offload",
            Self::RawPointers => "raw pointers",
            Self::Effects => "effects",
        }
    }

    /// Minimum profile this feature requires
    pub fn required_profile(self) -> Profile {
        match self {
            Self::Variables
            | Self::Functions
            | Self::Arithmetic
            | Self::ControlFlow
            | Self::ForLoops
            | Self::MatchStatements
            | Self::Arrays
            | Self::Ranges => Profile::Core,
            Self::Slices
            | Self::Structs
            | Self::Enums
            | Self::Optionals
            | Self::ErrorUnions
            | Self::Allocators => Profile::Service,
            Self::Generics | Self::ContextBounds | Self::Actors => Profile::Cluster,
            Self::Tensors | Self::NpuOffload => Profile::Compute,
            Self::RawPointers | Self::Effects => Profile::Sovereign,
        }
    }

    /// Whether this feature additionally sits behind the NPU gate
    pub fn needs_npu(self) -> bool {
        matches!(self, Self::NpuOffload)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Minimum profile for a binary operator. The whole binary set is available
/// from the teaching core; gating currently bites on the unary pointer
/// operators only, but every call site goes through this table.
pub fn binary_op_profile(_op: BinaryOp) -> Profile {
    Profile::Core
}

/// Minimum profile for a unary operator. Address-of and dereference are raw
/// pointer operations and sit in the top tier.
pub fn unary_op_profile(op: UnaryOp) -> Profile {
    match op {
        UnaryOp::Neg | UnaryOp::Not => Profile::Core,
        UnaryOp::AddressOf | UnaryOp::Deref => Profile::Sovereign,
    }
}

/// Structural limits a profile imposes independently of the feature table
#[derive(Debug, Clone)]
pub struct TypeRestriction {
    pub allowed_primitives: &'static [PrimitiveKind],
    pub max_fn_params: usize,
    pub allow_generics: bool,
    pub allow_effects: bool,
    pub allow_actors: bool,
}

static CORE_RESTRICTION: TypeRestriction = TypeRestriction {
    allowed_primitives: &[
        PrimitiveKind::I32,
        PrimitiveKind::F64,
        PrimitiveKind::Bool,
        PrimitiveKind::String,
        PrimitiveKind::Void,
        PrimitiveKind::Never,
    ],
    max_fn_params: 4,
    allow_generics: false,
    allow_effects: false,
    allow_actors: false,
};

static SERVICE_RESTRICTION: TypeRestriction = TypeRestriction {
    allowed_primitives: &PrimitiveKind::ALL,
    max_fn_params: 8,
    allow_generics: false,
    allow_effects: false,
    allow_actors: false,
};

static CLUSTER_RESTRICTION: TypeRestriction = TypeRestriction {
    allowed_primitives: &PrimitiveKind::ALL,
    max_fn_params: 16,
    allow_generics: true,
    allow_effects: false,
    allow_actors: true,
};

static COMPUTE_RESTRICTION: TypeRestriction = TypeRestriction {
    allowed_primitives: &PrimitiveKind::ALL,
    max_fn_params: 16,
    allow_generics: true,
    allow_effects: false,
    allow_actors: true,
};

static SOVEREIGN_RESTRICTION: TypeRestriction = TypeRestriction {
    allowed_primitives: &PrimitiveKind::ALL,
    max_fn_params: 255,
    allow_generics: true,
    allow_effects: true,
    allow_actors: true,
};

/// What a recorded violation is about
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    Feature(Feature),
    Operator(&'static str),
    PrimitiveType(PrimitiveKind),
    ParamCount { count: usize, max: usize },
    NpuGate(Feature),
}

/// One recorded gating violation
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    /// The profile the construct needs; `None` for NPU-gate violations
    pub required: Option<Profile>,
    pub current: Profile,
    pub span: Span,
}

/// Feature-gating engine for one analysis session
///
/// All `validate_*` entry points record instead of failing, so the profile
/// pass reports every violation in a unit.
#[derive(Debug)]
pub struct ProfileManager {
    profile: Profile,
    npu_enabled: bool,
    violations: Vec<Violation>,
}

impl ProfileManager {
    pub fn new(profile: Profile, npu_enabled: bool) -> Self {
        Self {
            profile,
            npu_enabled,
            violations: Vec::new(),
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Pure check without recording
    pub fn is_feature_allowed(&self, feature: Feature) -> bool {
        self.profile.includes(feature.required_profile())
            && (!feature.needs_npu() || self.npu_enabled)
    }

    /// Record a violation if `feature` is not available under the current
    /// profile, or if it needs the NPU gate and the gate is closed
    pub fn validate_feature(&mut self, feature: Feature, span: Span) {
        let required = feature.required_profile();
        if !self.profile.includes(required) {
            self.violations.push(Violation {
                kind: ViolationKind::Feature(feature),
                required: Some(required),
                current: self.profile,
                span,
            });
            return;
        }
        if feature.needs_npu() && !self.npu_enabled {
            self.violations.push(Violation {
                kind: ViolationKind::NpuGate(feature),
                required: None,
                current: self.profile,
                span,
            });
        }
    }

    pub fn validate_binary_op(&mut self, op: BinaryOp, span: Span) {
        let required = binary_op_profile(op);
        if !self.profile.includes(required) {
            self.violations.push(Violation {
                kind: ViolationKind::Operator(op.symbol()),
                required: Some(required),
                current: self.profile,
                span,
            });
        }
    }

    pub fn validate_unary_op(&mut self, op: UnaryOp, span: Span) {
        let required = unary_op_profile(op);
        if !self.profile.includes(required) {
            self.violations.push(Violation {
                kind: ViolationKind::Operator(op.symbol()),
                required: Some(required),
                current: self.profile,
                span,
            });
        }
    }

    /// Defense in depth: the primitive set restriction is enforced even if
    /// the feature table would have let a type through
    pub fn validate_primitive(&mut self, kind: PrimitiveKind, span: Span) {
        let restriction = self.profile.restriction();
        if !restriction.allowed_primitives.contains(&kind) {
            // the smallest profile whose restriction allows this primitive
            let required = Profile::ALL
                .into_iter()
                .find(|p| p.restriction().allowed_primitives.contains(&kind));
            self.violations.push(Violation {
                kind: ViolationKind::PrimitiveType(kind),
                required,
                current: self.profile,
                span,
            });
        }
    }

    pub fn validate_param_count(&mut self, count: usize, span: Span) {
        let max = self.profile.restriction().max_fn_params;
        if count > max {
            let required = Profile::ALL
                .into_iter()
                .find(|p| count <= p.restriction().max_fn_params);
            self.violations.push(Violation {
                kind: ViolationKind::ParamCount { count, max },
                required,
                current: self.profile,
                span,
            });
        }
    }

    /// Drain everything recorded so far
    pub fn take_violations(&mut self) -> Vec<Violation> {
        std::mem::take(&mut self.violations)
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn profiles_are_totally_ordered() {
        assert!(Profile::Core < Profile::Service);
        assert!(Profile::Service < Profile::Cluster);
        assert!(Profile::Cluster < Profile::Compute);
        assert!(Profile::Compute < Profile::Sovereign);
        assert!(Profile::Sovereign.includes(Profile::Core));
        assert!(!Profile::Core.includes(Profile::Service));
    }

    #[test]
    fn aliases_resolve_to_canonical_profiles() {
        assert_eq!(Profile::from_name("core"), Some(Profile::Core));
        assert_eq!(Profile::from_name("learning"), Some(Profile::Core));
        assert_eq!(Profile::from_name("standard"), Some(Profile::Service));
        assert_eq!(Profile::from_name("distributed"), Some(Profile::Cluster));
        assert_eq!(Profile::from_name("accelerated"), Some(Profile::Compute));
        assert_eq!(Profile::from_name("full"), Some(Profile::Sovereign));
        assert_eq!(Profile::from_name("ultimate"), None);
    }

    #[test]
    fn sovereign_feature_under_core_is_a_violation() {
        let mut manager = ProfileManager::new(Profile::Core, false);
        manager.validate_feature(Feature::Effects, Span::new(0, 4));

        let violations = manager.take_violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Feature(Feature::Effects));
        assert_eq!(violations[0].required, Some(Profile::Sovereign));
        assert_eq!(violations[0].current, Profile::Core);
    }

    #[test]
    fn sovereign_feature_under_sovereign_is_clean() {
        let mut manager = ProfileManager::new(Profile::Sovereign, false);
        manager.validate_feature(Feature::Effects, Span::new(0, 4));
        assert!(manager.take_violations().is_empty());
    }

    #[test]
    fn violations_accumulate_across_checks() {
        let mut manager = ProfileManager::new(Profile::Core, false);
        manager.validate_feature(Feature::Tensors, Span::new(0, 1));
        manager.validate_feature(Feature::Structs, Span::new(2, 3));
        manager.validate_feature(Feature::Arithmetic, Span::new(4, 5));
        assert_eq!(manager.violation_count(), 2);
    }

    #[test]
    fn npu_gate_is_orthogonal_to_rank() {
        // compute profile but gate closed
        let mut manager = ProfileManager::new(Profile::Compute, false);
        manager.validate_feature(Feature::NpuOffload, Span::default());
        let violations = manager.take_violations();
        assert_eq!(
            violations[0].kind,
            ViolationKind::NpuGate(Feature::NpuOffload)
        );

        // gate open: clean
        let mut manager = ProfileManager::new(Profile::Compute, true);
        manager.validate_feature(Feature::NpuOffload, Span::default());
        assert!(manager.take_violations().is_empty());
    }

    #[test]
    fn pointer_operators_need_sovereign() {
        let mut manager = ProfileManager::new(Profile::Service, false);
        manager.validate_unary_op(UnaryOp::Neg, Span::default());
        manager.validate_unary_op(UnaryOp::AddressOf, Span::default());
        let violations = manager.take_violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Operator("&"));
    }

    #[test]
    fn primitive_restriction_is_defense_in_depth() {
        let mut manager = ProfileManager::new(Profile::Core, false);
        manager.validate_primitive(PrimitiveKind::I32, Span::default());
        manager.validate_primitive(PrimitiveKind::I64, Span::default());
        let violations = manager.take_violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].kind,
            ViolationKind::PrimitiveType(PrimitiveKind::I64)
        );
        assert_eq!(violations[0].required, Some(Profile::Service));
    }

    #[test]
    fn param_count_restriction() {
        let mut manager = ProfileManager::new(Profile::Core, false);
        manager.validate_param_count(4, Span::default());
        manager.validate_param_count(5, Span::default());
        let violations = manager.take_violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].kind,
            ViolationKind::ParamCount { count: 5, max: 4 }
        );
        assert_eq!(violations[0].required, Some(Profile::Service));
    }
}
