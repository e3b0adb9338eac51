use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use shared::{Difficulty, SurfaceType, Trail, TrailCard, Units};

use crate::error::PlannerError;
use crate::format::format_distance;

const BUILTIN_TRAILS: &str = include_str!("../data/trails.json");

/// Static list of featured trails.
#[derive(Debug, Clone)]
pub struct TrailCatalogue {
    trails: Vec<Trail>,
}

impl TrailCatalogue {
    pub fn builtin() -> Result<Self, PlannerError> {
        Self::from_reader(BUILTIN_TRAILS.as_bytes())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PlannerError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PlannerError> {
        let trails: Vec<Trail> = serde_json::from_reader(reader)?;
        Ok(Self { trails })
    }

    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }

    /// Case-insensitive match on name or location. A blank query keeps
    /// everything, in catalogue order.
    pub fn filter(&self, query: &str) -> Vec<&Trail> {
        let needle = query.trim().to_lowercase();
        self.trails
            .iter()
            .filter(|trail| {
                needle.is_empty()
                    || trail.name.to_lowercase().contains(&needle)
                    || trail.location.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn cards(&self, query: &str, units: Units) -> Vec<TrailCard> {
        self.filter(query)
            .into_iter()
            .map(|trail| trail_card(trail, units))
            .collect()
    }
}

pub fn trail_card(trail: &Trail, units: Units) -> TrailCard {
    TrailCard {
        title: trail.name.clone(),
        subtitle: trail.location.clone(),
        distance: format_distance(trail.distance_m, units),
        difficulty: match trail.difficulty {
            Difficulty::Easy => "Easy",
            Difficulty::Moderate => "Moderate",
            Difficulty::Hard => "Hard",
        }
        .to_string(),
        surface: match trail.surface {
            SurfaceType::Paved => "Paved",
            SurfaceType::Gravel => "Gravel",
            SurfaceType::Trail => "Singletrack",
        }
        .to_string(),
        description: trail.description.clone(),
    }
}
