use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a coordinate system axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisDirection {
    East,
    West,
    North,
    South,
    Up,
    Down,
    Future,
    Past,
    ColumnPositive,
    ColumnNegative,
    RowPositive,
    RowNegative,
    DisplayRight,
    DisplayLeft,
    DisplayUp,
    DisplayDown,
    Other,
}

impl AxisDirection {
    /// The direction pointing the other way. `Other` is its own opposite.
    pub fn opposite(self) -> AxisDirection {
        use AxisDirection::*;
        match self {
            East => West,
            West => East,
            North => South,
            South => North,
            Up => Down,
            Down => Up,
            Future => Past,
            Past => Future,
            ColumnPositive => ColumnNegative,
            ColumnNegative => ColumnPositive,
            RowPositive => RowNegative,
            RowNegative => RowPositive,
            DisplayRight => DisplayLeft,
            DisplayLeft => DisplayRight,
            DisplayUp => DisplayDown,
            DisplayDown => DisplayUp,
            Other => Other,
        }
    }

    /// The "positive" member of the direction pair, e.g. `East` for `West`.
    pub fn absolute(self) -> AxisDirection {
        use AxisDirection::*;
        match self {
            West | South | Down | Past | ColumnNegative | RowNegative | DisplayLeft
            | DisplayDown => self.opposite(),
            _ => self,
        }
    }

    /// `true` for axes running east or west, or along grid columns or the
    /// horizontal display axis.
    pub fn is_horizontal_x(self) -> bool {
        use AxisDirection::*;
        matches!(
            self.absolute(),
            East | ColumnPositive | DisplayRight
        )
    }

    /// `true` for axes running north or south, or along grid rows or the
    /// vertical display axis.
    pub fn is_horizontal_y(self) -> bool {
        use AxisDirection::*;
        matches!(self.absolute(), North | RowPositive | DisplayUp)
    }
}

/// A coordinate reference system reduced to what grid mapping needs: a name
/// and the direction of each axis.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinateReferenceSystem {
    pub name: String,
    pub axes: Vec<AxisDirection>,
}

impl CoordinateReferenceSystem {
    pub fn new(name: impl Into<String>, axes: Vec<AxisDirection>) -> Self {
        Self {
            name: name.into(),
            axes,
        }
    }

    /// Longitude then latitude, in degrees.
    pub fn wgs84() -> Self {
        Self::new("WGS 84", vec![AxisDirection::East, AxisDirection::North])
    }

    /// Latitude then longitude, the axis order of the EPSG definition.
    pub fn wgs84_lat_lon() -> Self {
        Self::new(
            "WGS 84 (lat, lon)",
            vec![AxisDirection::North, AxisDirection::East],
        )
    }

    /// Image coordinates: columns to the right, rows downwards.
    pub fn image() -> Self {
        Self::new(
            "Image",
            vec![AxisDirection::DisplayRight, AxisDirection::DisplayDown],
        )
    }

    pub fn dimension(&self) -> usize {
        self.axes.len()
    }
}

impl fmt::Display for CoordinateReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.name, self.axes)
    }
}
