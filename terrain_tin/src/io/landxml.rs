//! LandXML TIN surfaces with their breaklines and boundaries.
//!
//! Coordinates are written and read as `x y z`. Linear and area features are
//! stored under `<Breaklines>`, voids, islands, holes and hulls under
//! `<Boundaries>`. A `desc` attribute carries the exact feature type.

use std::collections::HashMap;
use std::fmt::Write as _;

use log::{debug, warn};
use roxmltree::{Document, Node};

use crate::error::{Result, TinError};
use crate::geometry::Point3;
use crate::settings::TinSettings;
use crate::store::{FeatureAttributes, FeatureState, FeatureType, TinMesh};
use crate::triangulate::{thread_feature, triangulate_points};

use super::{parse_numbers, read_to_string, write_string};

/// Reads the first `<Surface>` of a LandXML file as a [`TinMesh`].
///
/// A surface with points but no faces is triangulated. Breaklines and
/// boundaries are threaded into the mesh; ones that cannot be inserted are
/// kept detached in the `TinError` state.
pub fn read_landxml_surface(path: &str, settings: &TinSettings) -> Result<TinMesh> {
    let xml = read_to_string(path)?;
    parse_landxml_surface(&xml, settings)
}

pub fn parse_landxml_surface(xml: &str, settings: &TinSettings) -> Result<TinMesh> {
    let doc = Document::parse(xml).map_err(|e| TinError::Parse(e.to_string()))?;
    let pnts = doc
        .descendants()
        .find(|n| n.has_tag_name("Pnts"))
        .ok_or_else(|| TinError::Parse("surface has no <Pnts>".into()))?;

    let mut vertices = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    for p in pnts.children().filter(|c| c.has_tag_name("P")) {
        let nums = parse_numbers(p.text().unwrap_or_default());
        if nums.len() < 3 {
            return Err(TinError::Parse(format!(
                "point {} needs three coordinates",
                vertices.len() + 1
            )));
        }
        let id = p
            .attribute("id")
            .map(str::to_owned)
            .unwrap_or_else(|| (vertices.len() + 1).to_string());
        by_id.insert(id, vertices.len());
        vertices.push(Point3::new(nums[0], nums[1], nums[2]));
    }

    let mut triangles = Vec::new();
    if let Some(faces) = doc.descendants().find(|n| n.has_tag_name("Faces")) {
        for f in faces.children().filter(|c| c.has_tag_name("F")) {
            if f.attribute("i") == Some("1") {
                continue;
            }
            let text = f.text().unwrap_or_default();
            let ids: Vec<&str> = text.split_whitespace().collect();
            if ids.len() < 3 {
                return Err(TinError::Parse(format!("face '{text}' needs three points")));
            }
            let mut face = [0usize; 3];
            for (slot, id) in face.iter_mut().zip(&ids) {
                *slot = *by_id
                    .get(*id)
                    .ok_or_else(|| TinError::Parse(format!("face refers to unknown point {id}")))?;
            }
            triangles.push(face);
        }
    }

    let mut mesh = if triangles.is_empty() {
        triangulate_points(&vertices, settings)?
    } else {
        TinMesh::from_triangles(vertices, &triangles, settings.clone())?
    };
    debug!(
        "read surface with {} points and {} triangles",
        mesh.point_count(),
        mesh.triangle_count()
    );

    for node in doc
        .descendants()
        .filter(|n| n.has_tag_name("Breakline") || n.has_tag_name("Boundary"))
    {
        let (feature_type, attributes, coords) = read_feature(&node)?;
        if coords.len() < 2 {
            continue;
        }
        let threaded = mesh
            .resolve_points(&coords)
            .and_then(|ids| thread_feature(&mut mesh, feature_type, attributes, &ids));
        match threaded {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => {
                warn!("{} could not be inserted: {e}", feature_type.name());
                mesh.add_detached_feature(feature_type, FeatureState::TinError, attributes, coords)?;
            }
            Err(e) => return Err(e),
        }
    }
    crate::reconcile::refresh_void_marks(&mut mesh)?;
    Ok(mesh)
}

fn read_feature(node: &Node) -> Result<(FeatureType, FeatureAttributes, Vec<Point3>)> {
    let feature_type = match node.attribute("desc").and_then(|d| d.parse::<FeatureType>().ok()) {
        Some(t) => t,
        None if node.has_tag_name("Boundary") => match node.attribute("bndType") {
            Some("outer") => FeatureType::Hull,
            Some("island") => FeatureType::Island,
            _ => FeatureType::Void,
        },
        None => match node.attribute("brkType") {
            Some("soft") => FeatureType::SoftBreakline,
            _ => FeatureType::Breakline,
        },
    };
    let attributes = FeatureAttributes {
        user_tag: node.attribute("userTag").and_then(|v| v.parse().ok()),
        feature_id: node.attribute("featureId").and_then(|v| v.parse().ok()),
    };
    let list = node
        .children()
        .find(|c| c.has_tag_name("PntList3D"))
        .and_then(|c| c.text())
        .unwrap_or_default();
    let nums = parse_numbers(list);
    if nums.len() % 3 != 0 {
        return Err(TinError::Parse(format!(
            "{} point list has {} values, not a multiple of three",
            feature_type.name(),
            nums.len()
        )));
    }
    let coords = nums
        .chunks(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect();
    Ok((feature_type, attributes, coords))
}

/// Writes `mesh` as a LandXML surface.
pub fn write_landxml_surface(path: &str, mesh: &TinMesh) -> Result<()> {
    write_string(path, &landxml_surface_string(mesh)?)?;
    Ok(())
}

pub fn landxml_surface_string(mesh: &TinMesh) -> Result<String> {
    mesh.require_tin()?;
    let mut numbers = vec![0usize; mesh.point_slots()];
    let mut xml = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(xml, "<?xml version=\"1.0\"?>");
    let _ = writeln!(xml, "<LandXML>");
    let _ = writeln!(xml, "  <Surfaces>");
    let _ = writeln!(xml, "    <Surface name=\"TIN\">");
    let _ = writeln!(xml, "      <Definition surfType=\"TIN\">");
    let _ = writeln!(xml, "        <Pnts>");
    for (i, p) in mesh.live_points().into_iter().enumerate() {
        numbers[p.index()] = i + 1;
        let v = mesh.point(p);
        let _ = writeln!(xml, "          <P id=\"{}\">{} {} {}</P>", i + 1, v.x, v.y, v.z);
    }
    let _ = writeln!(xml, "        </Pnts>");
    let _ = writeln!(xml, "        <Faces>");
    for t in mesh.triangles() {
        let _ = writeln!(
            xml,
            "          <F>{} {} {}</F>",
            numbers[t[0].index()],
            numbers[t[1].index()],
            numbers[t[2].index()]
        );
    }
    let _ = writeln!(xml, "        </Faces>");
    let _ = writeln!(xml, "      </Definition>");

    let mut breaklines = String::new();
    let mut boundaries = String::new();
    for f in mesh.active_features() {
        let record = mesh.feature(f);
        if record.first_point.is_none() {
            continue;
        }
        let feature_type = record.feature_type;
        let mut extra = String::new();
        if let Some(tag) = record.attributes.user_tag {
            let _ = write!(extra, " userTag=\"{tag}\"");
        }
        if let Some(id) = record.attributes.feature_id {
            let _ = write!(extra, " featureId=\"{id}\"");
        }
        let list: Vec<String> = mesh
            .feature_coordinates(f)?
            .iter()
            .map(|c| format!("{} {} {}", c.x, c.y, c.z))
            .collect();
        let list = list.join(" ");
        match feature_type {
            FeatureType::Void | FeatureType::Island | FeatureType::Hole | FeatureType::Hull => {
                let bnd = match feature_type {
                    FeatureType::Hull => "outer",
                    FeatureType::Island => "island",
                    _ => "void",
                };
                let _ = writeln!(
                    boundaries,
                    "        <Boundary bndType=\"{bnd}\" desc=\"{}\"{extra}><PntList3D>{list}</PntList3D></Boundary>",
                    feature_type.name()
                );
            }
            _ => {
                let brk = if feature_type == FeatureType::SoftBreakline {
                    "soft"
                } else {
                    "standard"
                };
                let _ = writeln!(
                    breaklines,
                    "        <Breakline brkType=\"{brk}\" desc=\"{}\"{extra}><PntList3D>{list}</PntList3D></Breakline>",
                    feature_type.name()
                );
            }
        }
    }
    if !breaklines.is_empty() || !boundaries.is_empty() {
        let _ = writeln!(xml, "      <SourceData>");
        if !breaklines.is_empty() {
            let _ = writeln!(xml, "        <Breaklines>");
            xml.push_str(&breaklines);
            let _ = writeln!(xml, "        </Breaklines>");
        }
        if !boundaries.is_empty() {
            let _ = writeln!(xml, "        <Boundaries>");
            xml.push_str(&boundaries);
            let _ = writeln!(xml, "        </Boundaries>");
        }
        let _ = writeln!(xml, "      </SourceData>");
    }
    let _ = writeln!(xml, "    </Surface>");
    let _ = writeln!(xml, "  </Surfaces>");
    let _ = writeln!(xml, "</LandXML>");
    Ok(xml)
}
