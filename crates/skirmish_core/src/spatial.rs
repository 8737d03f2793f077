//! Spatial queries and screen-to-ground projection.
//!
//! [`SpatialGrid`] is a uniform-grid hash rebuilt from agent positions
//! before each phase that needs neighbour lookups. Cells are keyed by
//! floored integer coordinates, so a query only visits the cells its
//! bounding square touches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::agent::AgentTable;
use crate::components::AgentId;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Source of "who is near this point" answers.
pub trait SpatialQuery {
    /// Agents whose collision circle intersects the disk at `center` with
    /// `radius`, in ascending id order.
    fn query_circle(&self, center: Vec2Fixed, radius: Fixed) -> Vec<AgentId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GridEntry {
    id: AgentId,
    position: Vec2Fixed,
    radius: Fixed,
}

/// Uniform-grid spatial hash.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: Fixed,
    cells: HashMap<(i32, i32), Vec<GridEntry>>,
    max_radius: Fixed,
}

impl SpatialGrid {
    /// Create an empty grid. Non-positive cell sizes fall back to one unit.
    #[must_use]
    pub fn new(cell_size: Fixed) -> Self {
        Self {
            cell_size: if cell_size > Fixed::ZERO {
                cell_size
            } else {
                Fixed::ONE
            },
            cells: HashMap::new(),
            max_radius: Fixed::ZERO,
        }
    }

    /// Remove all entries, keeping bucket allocations.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.max_radius = Fixed::ZERO;
    }

    /// Insert an agent's circle.
    pub fn insert(&mut self, id: AgentId, position: Vec2Fixed, radius: Fixed) {
        let coords = self.cell_coords(position);
        self.cells.entry(coords).or_default().push(GridEntry {
            id,
            position,
            radius,
        });
        self.max_radius = self.max_radius.max(radius);
    }

    /// Clear and refill from every agent in the table.
    pub fn rebuild(&mut self, agents: &AgentTable) {
        self.clear();
        for agent in agents.iter() {
            self.insert(agent.id, agent.position, agent.radius);
        }
    }

    /// Largest radius currently stored.
    #[must_use]
    pub fn max_radius(&self) -> Fixed {
        self.max_radius
    }

    fn cell_coords(&self, position: Vec2Fixed) -> (i32, i32) {
        (
            (position.x / self.cell_size).floor().saturating_to_num::<i32>(),
            (position.y / self.cell_size).floor().saturating_to_num::<i32>(),
        )
    }
}

impl SpatialQuery for SpatialGrid {
    fn query_circle(&self, center: Vec2Fixed, radius: Fixed) -> Vec<AgentId> {
        let reach = radius + self.max_radius;
        let span = Vec2Fixed::new(reach, reach);
        let min = self.cell_coords(center - span);
        let max = self.cell_coords(center + span);

        let mut result = Vec::new();
        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                let Some(bucket) = self.cells.get(&(x, y)) else {
                    continue;
                };
                for entry in bucket {
                    let limit = radius + entry.radius;
                    if entry.position.distance_squared(center) <= limit * limit {
                        result.push(entry.id);
                    }
                }
            }
        }
        result.sort_unstable();
        result
    }
}

impl SpatialQuery for AgentTable {
    fn query_circle(&self, center: Vec2Fixed, radius: Fixed) -> Vec<AgentId> {
        let mut result: Vec<_> = self
            .iter()
            .filter(|agent| {
                let limit = radius + agent.radius;
                agent.position.distance_squared(center) <= limit * limit
            })
            .map(|agent| agent.id)
            .collect();
        result.sort_unstable();
        result
    }
}

/// A point on screen, in pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenPoint {
    /// Horizontal pixel coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Vertical pixel coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

impl ScreenPoint {
    /// Create a screen point from integer pixels.
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x: Fixed::from_num(x),
            y: Fixed::from_num(y),
        }
    }
}

/// Three-component fixed-point vector, with `y` pointing up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Vec3Fixed {
    /// Ground X.
    pub x: Fixed,
    /// Height.
    pub y: Fixed,
    /// Ground depth, the ground plane's second axis.
    pub z: Fixed,
}

impl Vec3Fixed {
    /// Create a new vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        Self { x, y, z }
    }
}

/// A half-line in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ray {
    /// Start of the ray.
    pub origin: Vec3Fixed,
    /// Direction, not necessarily normalised.
    pub direction: Vec3Fixed,
}

impl Ray {
    /// Where the ray meets the ground plane (height zero).
    ///
    /// `None` when the ray runs parallel to the ground or points away from it.
    #[must_use]
    pub fn ground_intersection(&self) -> Option<Vec2Fixed> {
        let denom = self.direction.y;
        if denom.abs() <= Fixed::DELTA {
            return None;
        }
        let t = self.origin.y.checked_neg()?.checked_div(denom)?;
        if t < Fixed::ZERO {
            return None;
        }
        Some(Vec2Fixed::new(
            self.origin.x + self.direction.x * t,
            self.origin.z + self.direction.z * t,
        ))
    }
}

/// Turns screen positions into rays into the world.
pub trait GroundProjector {
    /// Ray through the given screen point.
    fn screen_ray(&self, point: ScreenPoint) -> Option<Ray>;

    /// Ground position under the given screen point.
    fn project_to_ground(&self, point: ScreenPoint) -> Option<Vec2Fixed> {
        self.screen_ray(point)?.ground_intersection()
    }
}

/// Camera with parallel rays, looking down at the field.
///
/// The viewport centre looks at `focus`. `tilt` leans every ray toward +z by
/// that many ground units per unit of descent; zero looks straight down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrthographicCamera {
    /// Ground point under the viewport centre when `tilt` is zero.
    pub focus: Vec2Fixed,
    /// Viewport size in pixels.
    pub viewport: (u32, u32),
    /// Ground units covered by one pixel.
    pub units_per_pixel: Fixed,
    /// Camera height above the ground.
    pub height: Fixed,
    /// Forward lean of the view rays.
    pub tilt: Fixed,
}

impl OrthographicCamera {
    /// Straight-down camera over `focus`.
    #[must_use]
    pub fn top_down(focus: Vec2Fixed, viewport: (u32, u32), units_per_pixel: Fixed) -> Self {
        Self {
            focus,
            viewport,
            units_per_pixel,
            height: Fixed::from_num(50),
            tilt: Fixed::ZERO,
        }
    }
}

impl GroundProjector for OrthographicCamera {
    fn screen_ray(&self, point: ScreenPoint) -> Option<Ray> {
        let half_w = Fixed::from_num(self.viewport.0) / Fixed::from_num(2);
        let half_h = Fixed::from_num(self.viewport.1) / Fixed::from_num(2);
        let x = self.focus.x + (point.x - half_w) * self.units_per_pixel;
        let z = self.focus.y + (point.y - half_h) * self.units_per_pixel;
        // Shift the origin back so the centre ray still lands on `focus`
        let z = z - self.tilt * self.height;
        Some(Ray {
            origin: Vec3Fixed::new(x, self.height, z),
            direction: Vec3Fixed::new(Fixed::ZERO, -Fixed::ONE, self.tilt),
        })
    }
}
