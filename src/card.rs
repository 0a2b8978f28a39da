use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Identifier of a card, unique among live cards.
///
/// Assigned by the catalog on create. Parse request input with
/// [`str::parse`]; only plain decimal digits are accepted.
///
/// ```
/// use cardlog::CardId;
///
/// let id: CardId = "7".parse().unwrap();
/// assert_eq!(id.get(), 7);
/// assert!("7a".parse::<CardId>().is_err());
/// assert!("-1".parse::<CardId>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(u64);

impl CardId {
    pub const fn new(id: u64) -> Self {
        CardId(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id following this one, or `None` past `u64::MAX`.
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(n) => Some(CardId(n)),
            None => None,
        }
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CardId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CatalogError::InvalidId(s.to_string()));
        }
        s.parse::<u64>()
            .map(CardId)
            .map_err(|_| CatalogError::InvalidId(s.to_string()))
    }
}

impl From<CardId> for Value {
    fn from(id: CardId) -> Self {
        Value::from(id.0)
    }
}

/// Progress of the tutorial a card points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardStatus {
    Planned,
    InProgress,
    Completed,
}

/// A tutorial catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub title: String,
    pub description: String,
    /// Route of the tutorial page, e.g. `/base/geometry`.
    pub path: String,
    /// Free-form date string. Listing order compares it bytewise.
    pub date: String,
    pub status: CardStatus,
    /// Display color, e.g. `#42b883`.
    pub color: String,
}

/// Caller input for creating a card. The id is always assigned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCard {
    pub title: String,
    pub description: String,
    pub path: String,
    pub date: String,
    pub status: CardStatus,
    pub color: String,
}

impl NewCard {
    pub fn with_id(self, id: CardId) -> Card {
        Card {
            id,
            title: self.title,
            description: self.description,
            path: self.path,
            date: self.date,
            status: self.status,
            color: self.color,
        }
    }
}

/// A merge-patch for an existing card.
///
/// Only fields that are `Some` are written; the rest keep their stored value.
/// There is no `id` field, so an `id` key in incoming JSON is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CardStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CardPatch {
    pub fn status(status: CardStatus) -> Self {
        CardPatch {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// What [`CardCatalog::update`](crate::CardCatalog::update) echoes back: the
/// target id and the patch as applied.
///
/// This is not a re-read of the stored card. Fields the patch left out are
/// `None` here even though the store still holds their old values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchedCard {
    pub id: CardId,
    #[serde(flatten)]
    pub patch: CardPatch,
}

struct Seed {
    id: u64,
    title: &'static str,
    description: &'static str,
    path: &'static str,
    date: &'static str,
    status: CardStatus,
    color: &'static str,
}

const SEED: [Seed; 6] = [
    Seed {
        id: 1,
        title: "场景与几何体",
        description: "学习Three.js的基础知识，包括创建场景、相机、渲染器和基本几何体，探索不同的3D形状。",
        path: "/base/geometry",
        date: "2025-01-15",
        status: CardStatus::Completed,
        color: "#42b883",
    },
    Seed {
        id: 2,
        title: "材质",
        description: "深入了解Three.js中的各种材质，创建逼真的3D效果和表面属性。",
        path: "/base/material",
        date: "2025-02-10",
        status: CardStatus::Completed,
        color: "#3498db",
    },
    Seed {
        id: 3,
        title: "相机控制",
        description: "学习如何使用不同类型的相机和控制器，实现交互式3D场景浏览和视角调整。",
        path: "/base/camera",
        date: "2025-03-05",
        status: CardStatus::Completed,
        color: "#e74c3c",
    },
    Seed {
        id: 4,
        title: "光照系统",
        description: "掌握Three.js中的各种光源类型，包括环境光、点光源、方向光和聚光灯，创建真实的光影效果。",
        path: "/base/light",
        date: "2025-04-12",
        status: CardStatus::Completed,
        color: "#f39c12",
    },
    Seed {
        id: 5,
        title: "动画控制",
        description: "学习如何在Three.js中创建流畅的动画效果，控制物体的移动、旋转和缩放，实现复杂的动画序列。",
        path: "/base/animation",
        date: "2025-05-20",
        status: CardStatus::Completed,
        color: "#9b59b6",
    },
    Seed {
        id: 6,
        title: "物理引擎",
        description: "将物理引擎集成到Three.js场景中，模拟真实世界的物理效果，包括重力、碰撞和弹性等物理现象。",
        path: "/base/physics",
        date: "2025-07-08",
        status: CardStatus::InProgress,
        color: "#2c3e50",
    },
];

/// The fixed default cards loaded on first start and by a reset.
///
/// Ids are explicit (1 through 6), not allocated.
pub fn seed_cards() -> Vec<Card> {
    SEED.iter()
        .map(|s| Card {
            id: CardId::new(s.id),
            title: s.title.to_string(),
            description: s.description.to_string(),
            path: s.path.to_string(),
            date: s.date.to_string(),
            status: s.status,
            color: s.color.to_string(),
        })
        .collect()
}
