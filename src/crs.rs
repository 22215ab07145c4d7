use std::{borrow::Cow, fmt, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use geo::Coord;
use proj4rs::{proj::Proj, transform::transform};

use crate::error::AnalysisError;

/// A coordinate reference system: a PROJ.4 definition, plus its EPSG code when known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Crs {
    epsg: Option<u32>,
    proj4: Cow<'static, str>,
    geographic: bool,
}

/// (epsg, proj4, geographic, names that identify it in a .prj file)
///
/// Names are compared on their letters and digits only, so ESRI (`GCS_ETRS_1989`) and
/// OGC (`ETRS89`) spellings need one entry each at most.
const KNOWN: &[(u32, &str, bool, &[&str])] = &[
    (4326, "+proj=longlat +datum=WGS84 +no_defs +type=crs", true,
        &["GCS_WGS_1984", "WGS 84"]),
    (4258, "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs +type=crs", true,
        &["GCS_ETRS_1989", "ETRS89"]),
    (4173, "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs +type=crs", true,
        &["GCS_IRENET95", "IRENET95"]),
    (2157, "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=0.99982 +x_0=600000 +y_0=750000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs", false,
        &["IRENET95_Irish_Transverse_Mercator"]),
    (29901, "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=1 +x_0=200000 +y_0=250000 +ellps=airy +towgs84=482.5,-130.6,564.6,-1.042,-0.214,-0.631,8.15 +units=m +no_defs +type=crs", false,
        &["OSNI_1952_Irish_National_Grid"]),
    (29902, "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=1.000035 +x_0=200000 +y_0=250000 +ellps=mod_airy +towgs84=482.5,-130.6,564.6,-1.042,-0.214,-0.631,8.15 +units=m +no_defs +type=crs", false,
        &["TM65_Irish_Grid"]),
    (29903, "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=1.000035 +x_0=200000 +y_0=250000 +ellps=mod_airy +towgs84=482.5,-130.6,564.6,-1.042,-0.214,-0.631,8.15 +units=m +no_defs +type=crs", false,
        &["TM75_Irish_Grid", "Irish_Grid"]),
    (27700, "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000 +ellps=airy +towgs84=446.448,-125.157,542.06,0.15,0.247,0.842,-20.489 +units=m +no_defs +type=crs", false,
        &["British_National_Grid", "OSGB 1936 / British National Grid", "OSGB36 / British National Grid"]),
    (32629, "+proj=utm +zone=29 +datum=WGS84 +units=m +no_defs +type=crs", false,
        &["WGS_1984_UTM_Zone_29N", "WGS 84 / UTM zone 29N"]),
];

impl Crs {
    /// WGS84 longitude/latitude.
    pub const WGS84: Crs = Crs::known(0);
    /// Irish Transverse Mercator (IRENET95), metres.
    pub const ITM: Crs = Crs::known(3);

    const fn known(i: usize) -> Self {
        Crs { epsg: Some(KNOWN[i].0), proj4: Cow::Borrowed(KNOWN[i].1), geographic: KNOWN[i].2 }
    }

    /// Look up a CRS by EPSG code.
    pub fn from_epsg(epsg: u32) -> Result<Self> {
        KNOWN.iter()
            .position(|(code, ..)| *code == epsg)
            .map(Crs::known)
            .ok_or_else(|| AnalysisError::UnknownCrs(format!("EPSG:{epsg}")).into())
    }

    /// Build a CRS from a PROJ.4 definition.
    pub fn from_proj4(proj4: impl Into<String>) -> Result<Self> {
        let proj4 = proj4.into();
        if Proj::from_proj_string(&proj4).is_err() {
            return Err(AnalysisError::UnknownCrs(proj4).into());
        }

        let geographic = proj4.contains("+proj=longlat") || proj4.contains("+proj=latlong");
        Ok(Crs { epsg: None, proj4: Cow::Owned(proj4), geographic })
    }

    /// Identify a CRS from ESRI/OGC WKT (the contents of a `.prj` file).
    ///
    /// The top-level name is tried against the known table first, then a top-level EPSG
    /// authority. Anything else is converted to PROJ.4 from the WKT parameters.
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        let wkt = wkt.trim();
        let projected = wkt.starts_with("PROJCS") || wkt.starts_with("PROJCRS");
        let authority = authority_epsg(wkt);

        let by_name = top_level_name(wkt).and_then(|name| {
            let name = normalize(name);
            KNOWN.iter().position(|&(_, _, geographic, names)| {
                geographic != projected && names.iter().any(|known| normalize(known) == name)
            })
        });
        let by_authority = || authority.and_then(|epsg| KNOWN.iter().position(|(code, ..)| *code == epsg));

        if let Some(i) = by_name.or_else(by_authority) {
            return Ok(Crs::known(i));
        }

        let unknown = || {
            let head: String = wkt.chars().take(80).collect();
            AnalysisError::UnknownCrs(head)
        };
        let proj4 = proj4wkt::wkt_to_projstring(wkt).map_err(|err| {
            log::debug!("WKT to PROJ.4 conversion failed: {err:?}");
            unknown()
        })?;

        let mut crs = Crs::from_proj4(proj4).map_err(|_| unknown())?;
        crs.epsg = authority;
        log::debug!("{crs} built from WKT: {}", crs.proj4);
        Ok(crs)
    }

    /// Read the `.prj` sidecar next to a shapefile, if any.
    /// Returns `Ok(None)` when no sidecar exists.
    pub fn from_prj_sidecar(shp_path: &Path) -> Result<Option<Self>> {
        let prj = shp_path.with_extension("prj");
        if !prj.exists() { return Ok(None) }

        let wkt = fs::read_to_string(&prj)
            .with_context(|| format!("[crs] Failed to read {}", prj.display()))?;
        Crs::from_wkt(&wkt)
            .with_context(|| format!("[crs] {}", prj.display()))
            .map(Some)
    }

    #[inline] pub fn epsg(&self) -> Option<u32> { self.epsg }

    #[inline] pub fn proj4(&self) -> &str { &self.proj4 }

    #[inline] pub fn is_geographic(&self) -> bool { self.geographic }
}

/// Letters and digits only, lowercased.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// The quoted name of the outermost WKT node, e.g. `OSNI_1952_Irish_National_Grid`.
fn top_level_name(wkt: &str) -> Option<&str> {
    let rest = &wkt[wkt.find("[\"")? + 2..];
    rest.find('"').map(|end| &rest[..end])
}

/// EPSG code of the outermost node's `AUTHORITY` (WKT1) or `ID` (WKT2), ignoring nested ones.
fn authority_epsg(wkt: &str) -> Option<u32> {
    let depth = |prefix: &str| prefix.chars().fold(0i32, |depth, c| match c {
        '[' => depth + 1,
        ']' => depth - 1,
        _ => depth,
    });

    ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","].iter()
        .filter_map(|tag| wkt.rfind(tag).map(|at| (at, at + tag.len())))
        .filter(|&(at, _)| depth(&wkt[..at]) == 1)
        .find_map(|(_, value)| wkt[value..]
            .trim_start_matches('"')
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .and_then(|digits| digits.parse().ok()))
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg {
            Some(epsg) => write!(f, "EPSG:{epsg}"),
            None => write!(f, "custom CRS"),
        }
    }
}

/// A prepared source → target coordinate transformation.
pub struct Transformer {
    from: Proj,
    to: Proj,
    from_geographic: bool,
    to_geographic: bool,
}

impl Transformer {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
        let build = |crs: &Crs| Proj::from_proj_string(crs.proj4())
            .with_context(|| anyhow!("failed to build PROJ.4 for {crs}: {}", crs.proj4()));

        Ok(Self {
            from: build(from)?,
            to: build(to)?,
            from_geographic: from.is_geographic(),
            to_geographic: to.is_geographic(),
        })
    }

    /// Transform one coordinate; geographic coordinates are in degrees on both ends.
    pub fn apply(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&self.from, &self.to, &mut point)
            .with_context(|| format!("CRS transform failed at ({}, {})", coord.x, coord.y))?;

        Ok(if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITM_WKT: &str = r#"PROJCS["IRENET95_Irish_Transverse_Mercator",GEOGCS["GCS_IRENET95",DATUM["D_IRENET95",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",600000.0],PARAMETER["False_Northing",750000.0],PARAMETER["Central_Meridian",-8.0],PARAMETER["Scale_Factor",0.99982],PARAMETER["Latitude_Of_Origin",53.5],UNIT["Meter",1.0]]"#;
    const WGS84_WKT: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

    const OSNI_WKT: &str = r#"PROJCS["OSNI_1952_Irish_National_Grid",GEOGCS["GCS_OSNI_1952",DATUM["D_OSNI_1952",SPHEROID["Airy_1830",6377563.396,299.3249646]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",200000.0],PARAMETER["False_Northing",250000.0],PARAMETER["Central_Meridian",-8.0],PARAMETER["Scale_Factor",1.0],PARAMETER["Latitude_Of_Origin",53.5],UNIT["Meter",1.0]]"#;
    const BNG_WKT: &str = r#"PROJCS["British_National_Grid",GEOGCS["GCS_OSGB_1936",DATUM["D_OSGB_1936",SPHEROID["Airy_1830",6377563.396,299.3249646]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",400000.0],PARAMETER["False_Northing",-100000.0],PARAMETER["Central_Meridian",-2.0],PARAMETER["Scale_Factor",0.9996012717],PARAMETER["Latitude_Of_Origin",49.0],UNIT["Meter",1.0]]"#;
    const IRENET95_WKT: &str = r#"GEOGCS["IRENET95",DATUM["IRENET95",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],TOWGS84[0,0,0,0,0,0,0],AUTHORITY["EPSG","6173"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4173"]]"#;
    const ETRS89_WKT: &str = r#"GEOGCS["ETRS89",DATUM["European_Terrestrial_Reference_System_1989",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],TOWGS84[0,0,0,0,0,0,0],AUTHORITY["EPSG","6258"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4258"]]"#;
    const MASS_WKT: &str = r#"PROJCS["NAD83 / Massachusetts Mainland",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],TOWGS84[0,0,0,0,0,0,0],AUTHORITY["EPSG","6269"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4269"]],PROJECTION["Lambert_Conformal_Conic_2SP"],PARAMETER["standard_parallel_1",42.68333333333333],PARAMETER["standard_parallel_2",41.71666666666667],PARAMETER["latitude_of_origin",41],PARAMETER["central_meridian",-71.5],PARAMETER["false_easting",200000],PARAMETER["false_northing",750000],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["X",EAST],AXIS["Y",NORTH],AUTHORITY["EPSG","26986"]]"#;

    #[test]
    fn wkt_detection() {
        assert_eq!(Crs::from_wkt(ITM_WKT).unwrap(), Crs::ITM);
        assert_eq!(Crs::from_wkt(WGS84_WKT).unwrap(), Crs::WGS84);
        assert!(Crs::from_wkt("LOCAL_CS[\"nowhere\"]").is_err());
    }

    #[test]
    fn irish_and_british_grids_are_recognised() {
        assert_eq!(Crs::from_wkt(OSNI_WKT).unwrap().epsg(), Some(29901));
        assert_eq!(Crs::from_wkt(BNG_WKT).unwrap().epsg(), Some(27700));

        let irenet = Crs::from_wkt(IRENET95_WKT).unwrap();
        assert_eq!(irenet.epsg(), Some(4173));
        assert!(irenet.is_geographic());
    }

    #[test]
    fn towgs84_clause_does_not_mean_wgs84() {
        assert_eq!(Crs::from_wkt(ETRS89_WKT).unwrap().epsg(), Some(4258));
    }

    #[test]
    fn top_level_authority_identifies_renamed_crs() {
        let renamed = ITM_WKT.replacen("IRENET95_Irish_Transverse_Mercator", "ITM (local copy)", 1);
        let renamed = format!("{},AUTHORITY[\"EPSG\",\"2157\"]]", renamed.strip_suffix(']').unwrap());
        assert_eq!(authority_epsg(&renamed), Some(2157));
        assert_eq!(Crs::from_wkt(&renamed).unwrap(), Crs::ITM);

        // Only nested authorities: none at the top level.
        let nested_only = format!("{}]", IRENET95_WKT.strip_suffix(",AUTHORITY[\"EPSG\",\"4173\"]]").unwrap());
        assert_eq!(authority_epsg(&nested_only), None);
    }

    #[test]
    fn unlisted_wkt_converts_to_proj4() {
        let crs = Crs::from_wkt(MASS_WKT).unwrap();
        assert_eq!(crs.epsg(), Some(26986));
        assert!(!crs.is_geographic());
        assert!(crs.proj4().contains("+proj=lcc"), "{}", crs.proj4());
        assert!(Transformer::new(&crs, &Crs::WGS84).is_ok());
    }

    #[test]
    fn epsg_lookup() {
        assert_eq!(Crs::from_epsg(2157).unwrap(), Crs::ITM);
        assert_eq!(Crs::from_epsg(29901).unwrap().to_string(), "EPSG:29901");
        assert!(Crs::ITM.proj4().contains("+k=0.99982"));
        assert!(Crs::WGS84.is_geographic());
        assert!(Crs::from_epsg(1234).is_err());
    }

    #[test]
    fn osni_grid_reprojects_to_itm() {
        // Both grids share a false origin at 53.5N 8W, offset by 400 km east and 500 km north.
        let osni = Crs::from_wkt(OSNI_WKT).unwrap();
        let xy = Transformer::new(&osni, &Crs::ITM).unwrap()
            .apply(Coord { x: 200_000.0, y: 250_000.0 }).unwrap();
        assert!((xy.x - 600_000.0).abs() < 200.0, "x = {}", xy.x);
        assert!((xy.y - 750_000.0).abs() < 200.0, "y = {}", xy.y);
    }

    #[test]
    fn itm_origin_round_trip() {
        // The ITM false origin sits at 53.5N 8W.
        let forward = Transformer::new(&Crs::WGS84, &Crs::ITM).unwrap();
        let xy = forward.apply(Coord { x: -8.0, y: 53.5 }).unwrap();
        assert!((xy.x - 600_000.0).abs() < 1.0, "x = {}", xy.x);
        assert!((xy.y - 750_000.0).abs() < 1.0, "y = {}", xy.y);

        let inverse = Transformer::new(&Crs::ITM, &Crs::WGS84).unwrap();
        let lonlat = inverse.apply(xy).unwrap();
        assert!((lonlat.x + 8.0).abs() < 1e-6);
        assert!((lonlat.y - 53.5).abs() < 1e-6);
    }
}
