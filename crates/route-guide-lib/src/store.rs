//! Feature storage and loading module
//!
//! This module provides the `FeatureStore`, the read-only database of named locations
//! the service answers lookups from. It is loaded once at startup and never mutated,
//! so it can be shared between sessions without any locking.

use crate::{Feature, Point, Rectangle, Result, RouteGuideError, utils};
use geo::Rect;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Information about the loaded features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreInfo {
    /// Number of features loaded
    pub feature_count: usize,
    /// Number of features with a non-empty name
    pub named_count: usize,
    /// Box around every stored location (None if empty)
    pub bounding_box: Option<Rect<i32>>,
}

/// Immutable sequence of features with precomputed metadata
#[derive(Clone, Debug, Default)]
pub struct FeatureStore {
    /// Features in database order
    features: Vec<Feature>,
    /// First position and number of features for each distinct location
    by_location: HashMap<Point, (usize, usize)>,
    /// Cached number of named features
    cached_named_count: usize,
    /// Cached bounding box of all locations
    cached_bounding_box: Option<Rect<i32>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl FeatureStore {
    /// Build a store from already parsed features, keeping their order
    pub fn from_features(features: Vec<Feature>) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("store::from_features");

        let mut by_location: HashMap<Point, (usize, usize)> =
            HashMap::with_capacity(features.len());
        let mut named_count = 0;

        for (index, feature) in features.iter().enumerate() {
            if !feature.location.is_valid() {
                tracing::warn!(
                    "Feature {:?} has a location outside the valid range: {}",
                    feature.name,
                    feature.location
                );
            }
            by_location.entry(feature.location).or_insert((index, 0)).1 += 1;
            if feature.is_named() {
                named_count += 1;
            }
        }

        let bounding_box = utils::bounding_box(features.iter().map(|f| &f.location));

        Self {
            features,
            by_location,
            cached_named_count: named_count,
            cached_bounding_box: bounding_box,
        }
    }

    /// Parse a JSON array of features
    pub fn from_json_str(json: &str) -> Result<Self> {
        let features: Vec<Feature> = serde_json::from_str(json)?;
        Ok(Self::from_features(features))
    }

    /// Parse a JSON array of features from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let features: Vec<Feature> = serde_json::from_reader(reader)?;
        Ok(Self::from_features(features))
    }

    /// Load the feature database from a JSON file
    ///
    /// A missing or malformed file is reported as [`RouteGuideError::Load`]; the service
    /// cannot start without it.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("store::from_path");

        let path = path.as_ref();
        let load = || -> Result<Self> {
            let file = std::fs::File::open(path)?;
            Self::from_reader(std::io::BufReader::new(file))
        };

        let store = load().map_err(|source| RouteGuideError::Load {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        tracing::info!(
            "Loaded {} features ({} named) from {}",
            store.len(),
            store.named_count(),
            path.display()
        );
        Ok(store)
    }

    /// Find the feature at exactly this location
    ///
    /// Returns the first stored feature with the same coordinates, or an unnamed feature
    /// at `point` when there is none.
    pub fn lookup(&self, point: &Point) -> Feature {
        match self.by_location.get(point) {
            Some(&(index, _)) => self.features[index].clone(),
            None => Feature::unnamed(*point),
        }
    }

    /// Whether any stored feature sits exactly at this location
    #[inline]
    pub fn contains_location(&self, point: &Point) -> bool {
        self.by_location.contains_key(point)
    }

    /// Number of stored features sitting exactly at this location
    #[inline]
    pub fn count_at(&self, point: &Point) -> usize {
        self.by_location.get(point).map_or(0, |&(_, count)| count)
    }

    /// Lazily iterate the features inside a rectangle, in store order
    ///
    /// Each call starts a fresh scan.
    pub fn query<'a>(
        &'a self,
        rect: &Rectangle,
    ) -> impl Iterator<Item = &'a Feature> + use<'a> {
        let rect = *rect;
        self.features
            .iter()
            .filter(move |feature| utils::contains(&feature.location, &rect))
    }

    /// All features in store order
    #[inline]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of features with a non-empty name
    ///
    /// This is O(1) as the value is cached during construction.
    #[inline]
    pub fn named_count(&self) -> usize {
        self.cached_named_count
    }

    /// Box around every stored location, `None` for an empty store
    #[inline]
    pub fn bounding_box(&self) -> Option<Rect<i32>> {
        self.cached_bounding_box
    }

    /// Get store information
    #[inline]
    pub fn info(&self) -> StoreInfo {
        StoreInfo {
            feature_count: self.features.len(),
            named_count: self.cached_named_count,
            bounding_box: self.cached_bounding_box,
        }
    }
}
