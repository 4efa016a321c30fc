pub mod view;

use tracing::debug;

use crate::error::TrackError;
use crate::models::location::GeoPoint;

/// Opaque handle to a rendered layer, issued by the map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    User,
    Driver,
}

/// Rendering surface collaborator. Implementations map these onto the
/// actual map library; errors mean the library is unavailable and the view
/// degrades to textual status.
pub trait MapSurface {
    fn add_marker(&mut self, kind: MarkerKind, at: GeoPoint) -> Result<LayerId, TrackError>;
    fn move_marker(&mut self, id: LayerId, to: GeoPoint) -> Result<(), TrackError>;
    fn remove_marker(&mut self, id: LayerId) -> Result<(), TrackError>;
    fn draw_route(&mut self, from: GeoPoint, to: GeoPoint) -> Result<LayerId, TrackError>;
    fn remove_route(&mut self, id: LayerId) -> Result<(), TrackError>;
}

/// Diffs the desired marker/route set against what is already drawn and
/// applies the minimal mutations. Holds at most one user marker, one driver
/// marker and one route line; the old line is always removed before a new
/// one is drawn.
#[derive(Default)]
pub struct MapReconciler {
    user_marker: Option<(LayerId, GeoPoint)>,
    driver_marker: Option<(LayerId, GeoPoint)>,
    route: Option<(LayerId, GeoPoint, GeoPoint)>,
}

impl MapReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile(
        &mut self,
        surface: &mut dyn MapSurface,
        reference: Option<GeoPoint>,
        driver: Option<GeoPoint>,
    ) -> Result<(), TrackError> {
        let wanted_user = reference.filter(GeoPoint::is_meaningful);
        let wanted_driver = driver.filter(GeoPoint::is_meaningful);

        Self::sync_marker(surface, &mut self.user_marker, MarkerKind::User, wanted_user)?;
        Self::sync_marker(
            surface,
            &mut self.driver_marker,
            MarkerKind::Driver,
            wanted_driver,
        )?;

        self.sync_route(surface)?;
        Ok(())
    }

    /// Tears everything down, e.g. on view unmount.
    pub fn clear(&mut self, surface: &mut dyn MapSurface) -> Result<(), TrackError> {
        if let Some((id, _, _)) = self.route.take() {
            surface.remove_route(id)?;
        }
        if let Some((id, _)) = self.user_marker.take() {
            surface.remove_marker(id)?;
        }
        if let Some((id, _)) = self.driver_marker.take() {
            surface.remove_marker(id)?;
        }
        Ok(())
    }

    pub fn has_driver_marker(&self) -> bool {
        self.driver_marker.is_some()
    }

    pub fn has_route(&self) -> bool {
        self.route.is_some()
    }

    fn sync_marker(
        surface: &mut dyn MapSurface,
        slot: &mut Option<(LayerId, GeoPoint)>,
        kind: MarkerKind,
        wanted: Option<GeoPoint>,
    ) -> Result<(), TrackError> {
        match wanted {
            Some(at) => {
                if let Some((id, current)) = slot {
                    if *current != at {
                        surface.move_marker(*id, at)?;
                        *current = at;
                    }
                } else {
                    let id = surface.add_marker(kind, at)?;
                    debug!(?kind, "marker added");
                    *slot = Some((id, at));
                }
            }
            None => {
                // Removed outright, never left stale or merely hidden.
                if let Some((id, _)) = slot.take() {
                    surface.remove_marker(id)?;
                    debug!(?kind, "marker removed");
                }
            }
        }
        Ok(())
    }

    fn sync_route(&mut self, surface: &mut dyn MapSurface) -> Result<(), TrackError> {
        let endpoints = match (&self.driver_marker, &self.user_marker) {
            (Some((_, from)), Some((_, to))) => Some((*from, *to)),
            _ => None,
        };

        match (self.route, endpoints) {
            (Some((id, from, to)), Some((new_from, new_to))) => {
                if from != new_from || to != new_to {
                    surface.remove_route(id)?;
                    self.route = None;
                    let id = surface.draw_route(new_from, new_to)?;
                    self.route = Some((id, new_from, new_to));
                }
            }
            (None, Some((from, to))) => {
                let id = surface.draw_route(from, to)?;
                self.route = Some((id, from, to));
            }
            (Some((id, _, _)), None) => {
                surface.remove_route(id)?;
                self.route = None;
            }
            (None, None) => {}
        }
        Ok(())
    }
}

/// Surface that only logs operations; used when no real map library is
/// wired in, keeping the view degraded-but-alive.
#[derive(Default)]
pub struct LogSurface {
    next_id: u64,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> LayerId {
        self.next_id += 1;
        LayerId(self.next_id)
    }
}

impl MapSurface for LogSurface {
    fn add_marker(&mut self, kind: MarkerKind, at: GeoPoint) -> Result<LayerId, TrackError> {
        let id = self.next();
        debug!(?kind, at = %at.display(), layer = id.0, "add marker");
        Ok(id)
    }

    fn move_marker(&mut self, id: LayerId, to: GeoPoint) -> Result<(), TrackError> {
        debug!(layer = id.0, to = %to.display(), "move marker");
        Ok(())
    }

    fn remove_marker(&mut self, id: LayerId) -> Result<(), TrackError> {
        debug!(layer = id.0, "remove marker");
        Ok(())
    }

    fn draw_route(&mut self, from: GeoPoint, to: GeoPoint) -> Result<LayerId, TrackError> {
        let id = self.next();
        debug!(from = %from.display(), to = %to.display(), layer = id.0, "draw route");
        Ok(id)
    }

    fn remove_route(&mut self, id: LayerId) -> Result<(), TrackError> {
        debug!(layer = id.0, "remove route");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct RecordingSurface {
        next_id: u64,
        markers: HashMap<LayerId, (MarkerKind, GeoPoint)>,
        routes: HashMap<LayerId, (GeoPoint, GeoPoint)>,
        route_draws: usize,
    }

    impl RecordingSurface {
        fn marker_count(&self, kind: MarkerKind) -> usize {
            self.markers.values().filter(|(k, _)| *k == kind).count()
        }
    }

    impl MapSurface for RecordingSurface {
        fn add_marker(&mut self, kind: MarkerKind, at: GeoPoint) -> Result<LayerId, TrackError> {
            self.next_id += 1;
            let id = LayerId(self.next_id);
            self.markers.insert(id, (kind, at));
            Ok(id)
        }

        fn move_marker(&mut self, id: LayerId, to: GeoPoint) -> Result<(), TrackError> {
            let entry = self
                .markers
                .get_mut(&id)
                .ok_or_else(|| TrackError::Map(format!("unknown marker {id:?}")))?;
            entry.1 = to;
            Ok(())
        }

        fn remove_marker(&mut self, id: LayerId) -> Result<(), TrackError> {
            self.markers
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| TrackError::Map(format!("unknown marker {id:?}")))
        }

        fn draw_route(&mut self, from: GeoPoint, to: GeoPoint) -> Result<LayerId, TrackError> {
            self.next_id += 1;
            self.route_draws += 1;
            let id = LayerId(self.next_id);
            self.routes.insert(id, (from, to));
            Ok(id)
        }

        fn remove_route(&mut self, id: LayerId) -> Result<(), TrackError> {
            self.routes
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| TrackError::Map(format!("unknown route {id:?}")))
        }
    }

    struct BrokenSurface;

    impl MapSurface for BrokenSurface {
        fn add_marker(&mut self, _: MarkerKind, _: GeoPoint) -> Result<LayerId, TrackError> {
            Err(TrackError::Map("map library not loaded".to_string()))
        }
        fn move_marker(&mut self, _: LayerId, _: GeoPoint) -> Result<(), TrackError> {
            Err(TrackError::Map("map library not loaded".to_string()))
        }
        fn remove_marker(&mut self, _: LayerId) -> Result<(), TrackError> {
            Err(TrackError::Map("map library not loaded".to_string()))
        }
        fn draw_route(&mut self, _: GeoPoint, _: GeoPoint) -> Result<LayerId, TrackError> {
            Err(TrackError::Map("map library not loaded".to_string()))
        }
        fn remove_route(&mut self, _: LayerId) -> Result<(), TrackError> {
            Err(TrackError::Map("map library not loaded".to_string()))
        }
    }

    const HOME: GeoPoint = GeoPoint {
        lat: 33.57,
        lng: -7.59,
    };
    const DRIVER: GeoPoint = GeoPoint {
        lat: 33.58,
        lng: -7.60,
    };

    #[test]
    fn driver_marker_follows_sample_presence() {
        let mut surface = RecordingSurface::default();
        let mut reconciler = MapReconciler::new();

        reconciler
            .reconcile(&mut surface, Some(HOME), None)
            .unwrap();
        assert_eq!(surface.marker_count(MarkerKind::Driver), 0);
        assert_eq!(surface.marker_count(MarkerKind::User), 1);

        reconciler
            .reconcile(&mut surface, Some(HOME), Some(DRIVER))
            .unwrap();
        assert_eq!(surface.marker_count(MarkerKind::Driver), 1);
        assert_eq!(surface.routes.len(), 1);

        reconciler
            .reconcile(&mut surface, Some(HOME), None)
            .unwrap();
        assert_eq!(surface.marker_count(MarkerKind::Driver), 0);
        assert!(surface.routes.is_empty());
        assert!(!reconciler.has_route());
    }

    #[test]
    fn route_lines_never_accumulate() {
        let mut surface = RecordingSurface::default();
        let mut reconciler = MapReconciler::new();

        let mut driver = DRIVER;
        for _ in 0..10 {
            reconciler
                .reconcile(&mut surface, Some(HOME), Some(driver))
                .unwrap();
            assert_eq!(surface.routes.len(), 1);
            driver.lat -= 0.001;
        }

        assert_eq!(surface.route_draws, 10);
    }

    #[test]
    fn unchanged_state_applies_no_mutations() {
        let mut surface = RecordingSurface::default();
        let mut reconciler = MapReconciler::new();

        reconciler
            .reconcile(&mut surface, Some(HOME), Some(DRIVER))
            .unwrap();
        let draws_before = surface.route_draws;

        reconciler
            .reconcile(&mut surface, Some(HOME), Some(DRIVER))
            .unwrap();
        assert_eq!(surface.route_draws, draws_before);
        assert_eq!(surface.markers.len(), 2);
    }

    #[test]
    fn user_marker_moves_when_address_changes() {
        let mut surface = RecordingSurface::default();
        let mut reconciler = MapReconciler::new();

        reconciler
            .reconcile(&mut surface, Some(HOME), None)
            .unwrap();

        let new_home = GeoPoint {
            lat: 33.60,
            lng: -7.62,
        };
        reconciler
            .reconcile(&mut surface, Some(new_home), None)
            .unwrap();

        assert_eq!(surface.marker_count(MarkerKind::User), 1);
        let (_, at) = surface.markers.values().next().unwrap();
        assert_eq!(*at, new_home);
    }

    #[test]
    fn null_island_reference_draws_nothing() {
        let mut surface = RecordingSurface::default();
        let mut reconciler = MapReconciler::new();

        let unset = GeoPoint { lat: 0.0, lng: 0.0 };
        reconciler
            .reconcile(&mut surface, Some(unset), None)
            .unwrap();
        assert!(surface.markers.is_empty());
    }

    #[test]
    fn broken_surface_degrades_to_an_error_not_a_panic() {
        let mut reconciler = MapReconciler::new();
        let result = reconciler.reconcile(&mut BrokenSurface, Some(HOME), Some(DRIVER));
        assert!(matches!(result, Err(TrackError::Map(_))));
    }

    #[test]
    fn clear_removes_all_layers() {
        let mut surface = RecordingSurface::default();
        let mut reconciler = MapReconciler::new();

        reconciler
            .reconcile(&mut surface, Some(HOME), Some(DRIVER))
            .unwrap();
        reconciler.clear(&mut surface).unwrap();

        assert!(surface.markers.is_empty());
        assert!(surface.routes.is_empty());
    }
}
