use geo_types::Coord;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// A `(longitude, latitude)` pair: `x` is longitude, `y` is latitude.
pub type Coordinate = Coord<f64>;

/// One recorded track. Cloning shares the underlying points.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    coords: Rc<[Coordinate]>,
}

impl Route {
    pub fn new(coords: Vec<Coordinate>) -> Self {
        Self {
            coords: coords.into(),
        }
    }

    #[cfg(test)]
    pub fn from_lon_lat(pairs: &[[f64; 2]]) -> Self {
        Self::new(pairs.iter().map(|&[x, y]| Coord { x, y }).collect())
    }

    pub fn key(&self) -> RouteKey {
        RouteKey {
            len: self.coords.len(),
            first: self.coords.first().copied(),
            last: self.coords.last().copied(),
        }
    }

    pub fn endpoints(&self) -> Option<RunEndpoints> {
        Some(RunEndpoints {
            start: *self.coords.first()?,
            end: *self.coords.last()?,
        })
    }
}

impl Deref for Route {
    type Target = [Coordinate];

    fn deref(&self) -> &[Coordinate] {
        &self.coords
    }
}

/// Cheap identity for a route, used to notice when the displayed run changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteKey {
    pub len: usize,
    pub first: Option<Coordinate>,
    pub last: Option<Coordinate>,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |c: Option<Coordinate>| {
            c.map(|c| format!("{},{}", c.x, c.y))
                .unwrap_or_default()
        };
        write!(f, "{}-{}-{}", self.len, side(self.first), side(self.last))
    }
}

/// Where the start and end markers of a single run go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunEndpoints {
    pub start: Coordinate,
    pub end: Coordinate,
}

/// Every route currently displayed on the map, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteCollection {
    pub routes: Vec<Route>,
}

impl RouteCollection {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The route to animate, if exactly one non-empty route is shown.
    pub fn single_run(&self) -> Option<&Route> {
        match self.routes.as_slice() {
            [route] if !route.is_empty() => Some(route),
            _ => None,
        }
    }

    pub fn total_points(&self) -> usize {
        self.routes.iter().map(|r| r.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let route = Route::from_lon_lat(&[[116.3, 39.9], [116.4, 40.0], [116.5, 40.1]]);
        assert_eq!(route.key().to_string(), "3-116.3,39.9-116.5,40.1");
        assert_eq!(Route::new(vec![]).key().to_string(), "0--");
    }

    #[test]
    fn test_key_changes_with_endpoints() {
        let a = Route::from_lon_lat(&[[0.0, 0.0], [1.0, 1.0]]);
        let b = Route::from_lon_lat(&[[0.0, 0.0], [2.0, 2.0]]);
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), a.clone().key());
    }

    #[test]
    fn test_single_run_detection() {
        let one = Route::from_lon_lat(&[[5.0, 5.0]]);
        let two = Route::from_lon_lat(&[[0.0, 0.0], [1.0, 1.0]]);

        assert!(RouteCollection::default().single_run().is_none());
        assert!(RouteCollection::new(vec![Route::new(vec![])]).single_run().is_none());
        assert_eq!(
            RouteCollection::new(vec![one.clone()]).single_run(),
            Some(&one)
        );
        let both = RouteCollection::new(vec![one, two]);
        assert!(both.single_run().is_none());
        assert_eq!(both.total_points(), 3);
    }

    #[test]
    fn test_endpoints() {
        let route = Route::from_lon_lat(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let ends = route.endpoints().unwrap();
        assert_eq!(ends.start, Coord { x: 1.0, y: 2.0 });
        assert_eq!(ends.end, Coord { x: 5.0, y: 6.0 });
        assert!(Route::new(vec![]).endpoints().is_none());
    }
}
