//! Core role vocabulary: `RecoveryRole`, `RoleCapability`, `RoleAgentConfig`.
//!
//! The four roles are one static data table; the orchestrator iterates it in
//! declaration order, which is also the display order.

use serde::{Deserialize, Serialize};

/// The four roles of a recovery cycle, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryRole {
    Therapist,
    Closure,
    RoutinePlanner,
    Honesty,
}

impl RecoveryRole {
    /// All roles in the fixed display order.
    pub const ALL: [RecoveryRole; 4] = [
        RecoveryRole::Therapist,
        RecoveryRole::Closure,
        RecoveryRole::RoutinePlanner,
        RecoveryRole::Honesty,
    ];

    /// The static configuration row for this role.
    pub fn config(self) -> &'static RoleAgentConfig {
        &ROLE_TABLE[self as usize]
    }
}

impl std::fmt::Display for RecoveryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecoveryRole::Therapist => "therapist",
            RecoveryRole::Closure => "closure",
            RecoveryRole::RoutinePlanner => "routine_planner",
            RecoveryRole::Honesty => "honesty",
        };
        write!(f, "{s}")
    }
}

/// Optional tool integrations a role may use during generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCapability {
    /// Live web search grounding.
    WebSearch,
}

/// The register directive, optionally as a numbered list item.
macro_rules! register_directive {
    () => {
        "If the user responds in hinglish, give the whole reply in hinglish or hindi"
    };
    ($n:literal) => {
        concat!($n, ". ", register_directive!())
    };
}

/// Directive every role carries so replies match the user's register.
pub const REGISTER_DIRECTIVE: &str = register_directive!();

/// Static definition of one role agent. Templates do not execute.
#[derive(Debug)]
pub struct RoleAgentConfig {
    pub role: RecoveryRole,
    pub name: &'static str,
    /// Section heading shown above this role's output.
    pub heading: &'static str,
    /// Progress text shown while this role is generating.
    pub pending_label: &'static str,
    pub instructions: &'static [&'static str],
    pub capabilities: &'static [RoleCapability],
}

impl RoleAgentConfig {
    pub fn has_capability(&self, capability: RoleCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// The four role agents. Row order must match [`RecoveryRole`] discriminants.
pub static ROLE_TABLE: [RoleAgentConfig; 4] = [
    RoleAgentConfig {
        role: RecoveryRole::Therapist,
        name: "Therapist Agent",
        heading: "🤗 Emotional Support",
        pending_label: "🤗 Getting empathetic support...",
        instructions: &[
            "You are an empathetic therapist that:",
            "1. Listens with empathy and validates feelings",
            "2. Uses gentle humor to lighten the mood",
            "3. Shares relatable breakup experiences",
            "4. Offers comforting words and encouragement",
            "5. Analyzes both text and image inputs for emotional context",
            register_directive!(6),
            "Be supportive and understanding in your responses",
        ],
        capabilities: &[],
    },
    RoleAgentConfig {
        role: RecoveryRole::Closure,
        name: "Closure Agent",
        heading: "✍️ Finding Closure",
        pending_label: "✍️ Crafting closure messages...",
        instructions: &[
            "You are a closure specialist that:",
            "1. Creates emotional messages for unsent feelings",
            "2. Helps express raw, honest emotions",
            "3. Formats messages clearly with headers",
            "4. Ensures tone is heartfelt and authentic",
            register_directive!(5),
            "Focus on emotional release and closure",
        ],
        capabilities: &[],
    },
    RoleAgentConfig {
        role: RecoveryRole::RoutinePlanner,
        name: "Routine Planner Agent",
        heading: "📅 Your Recovery Plan",
        pending_label: "📅 Creating your recovery plan...",
        instructions: &[
            "You are a recovery routine planner that:",
            "1. Designs 7-day recovery challenges",
            "2. Includes fun activities and self-care tasks",
            "3. Suggests social media detox strategies",
            "4. Creates empowering playlists",
            register_directive!(5),
            "Focus on practical recovery steps",
        ],
        capabilities: &[],
    },
    RoleAgentConfig {
        role: RecoveryRole::Honesty,
        name: "Brutal Honesty Agent",
        heading: "💪 Honest Perspective",
        pending_label: "💪 Getting honest perspective...",
        instructions: &[
            "You are a direct feedback specialist that:",
            "1. Gives raw, objective feedback about breakups",
            "2. Explains relationship failures clearly",
            "3. Uses blunt, factual language",
            "4. Provides reasons to move forward",
            register_directive!(5),
            "Focus on honest insights without sugar-coating",
        ],
        capabilities: &[RoleCapability::WebSearch],
    },
];
