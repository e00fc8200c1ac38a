//! OpenDRIVE map parser.
//!
//! Reads the subset of the format the rest of the crate consumes: road
//! headers and links, line and arc plan view geometry, elevation profiles,
//! lane sections with cubic widths, signals, and junctions with lane
//! links. Unknown elements are skipped; unsupported geometry primitives
//! degrade to straight lines with a warning.

use minidom::Element;
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::road::network::{
    Connection, ContactPoint, Elevation, Geometry, GeometryKind, Junction, Lane, LaneSection,
    LinkTarget, Orientation, Road, RoadLink, RoadNetwork, TrafficSignal, WidthRecord,
};
use crate::road::{JunctionId, RoadId};

#[derive(Debug, Fail)]
pub enum ParseError {
    #[fail(display = "could not parse XML: {}", _0)]
    Xml(String),
    #[fail(display = "missing element <{}> in {}", element, context)]
    MissingElement { element: String, context: String },
    #[fail(display = "missing attribute '{}' on <{}> in {}", attribute, element, context)]
    MissingAttribute {
        attribute: String,
        element: String,
        context: String,
    },
    #[fail(display = "attribute '{}' on <{}> in {} is not a number: {}", attribute, element, context, value)]
    BadNumber {
        attribute: String,
        element: String,
        context: String,
        value: String,
    },
    #[fail(display = "invalid road network: {}", _0)]
    Model(String),
}

pub fn parse_opendrive(xml: &str) -> Result<RoadNetwork, ParseError> {
    let root: Element = xml
        .parse()
        .map_err(|e| ParseError::Xml(format!("{:?}", e)))?;
    if root.name() != "OpenDRIVE" {
        return Err(ParseError::MissingElement {
            element: "OpenDRIVE".to_string(),
            context: "document root".to_string(),
        });
    }

    let mut roads = Vec::new();
    let mut junctions = Vec::new();
    let mut signals = Vec::new();
    for child in root.children() {
        match child.name() {
            "road" => {
                let (road, mut road_signals) = parse_road(child)?;
                roads.push(road);
                signals.append(&mut road_signals);
            }
            "junction" => junctions.push(parse_junction(child)?),
            _ => {}
        }
    }

    RoadNetwork::assemble(roads, junctions, signals)
        .map_err(|e| ParseError::Model(e.to_string()))
}

fn child<'a>(el: &'a Element, name: &str) -> Option<&'a Element> {
    el.children().find(|c| c.name() == name)
}

fn children<'a>(el: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    el.children().filter(move |c| c.name() == name)
}

fn require_child<'a>(el: &'a Element, name: &str, context: &str) -> Result<&'a Element, ParseError> {
    child(el, name).ok_or_else(|| ParseError::MissingElement {
        element: name.to_string(),
        context: context.to_string(),
    })
}

fn attr_str(el: &Element, name: &str, context: &str) -> Result<String, ParseError> {
    el.attr(name)
        .map(|v| v.to_string())
        .ok_or_else(|| ParseError::MissingAttribute {
            attribute: name.to_string(),
            element: el.name().to_string(),
            context: context.to_string(),
        })
}

fn attr_f64(el: &Element, name: &str, context: &str) -> Result<f64, ParseError> {
    let value = attr_str(el, name, context)?;
    value.parse::<f64>().map_err(|_| ParseError::BadNumber {
        attribute: name.to_string(),
        element: el.name().to_string(),
        context: context.to_string(),
        value,
    })
}

fn attr_i32(el: &Element, name: &str, context: &str) -> Result<i32, ParseError> {
    let value = attr_str(el, name, context)?;
    value.parse::<i32>().map_err(|_| ParseError::BadNumber {
        attribute: name.to_string(),
        element: el.name().to_string(),
        context: context.to_string(),
        value,
    })
}

fn parse_road(el: &Element) -> Result<(Road, Vec<TrafficSignal>), ParseError> {
    let id: RoadId = attr_i32(el, "id", "road")?;
    let ctx = format!("road {}", id);
    let name = el.attr("name").unwrap_or("").to_string();
    let length = attr_f64(el, "length", &ctx)?;
    let junction = match el.attr("junction") {
        None | Some("-1") => None,
        Some(j) => Some(j.parse::<JunctionId>().map_err(|_| ParseError::BadNumber {
            attribute: "junction".to_string(),
            element: "road".to_string(),
            context: ctx.clone(),
            value: j.to_string(),
        })?),
    };

    let link = match child(el, "link") {
        Some(link_el) => RoadLink {
            predecessor: parse_link_target(link_el, "predecessor", &ctx)?,
            successor: parse_link_target(link_el, "successor", &ctx)?,
        },
        None => RoadLink::default(),
    };

    let plan_view = require_child(el, "planView", &ctx)?;
    let mut geometry = Vec::new();
    for geo_el in children(plan_view, "geometry") {
        geometry.push(parse_geometry(geo_el, id, &ctx)?);
    }
    if geometry.is_empty() {
        return Err(ParseError::MissingElement {
            element: "geometry".to_string(),
            context: ctx,
        });
    }
    geometry.sort_by(|a, b| a.s.partial_cmp(&b.s).unwrap_or(std::cmp::Ordering::Equal));

    let mut elevation = Vec::new();
    if let Some(profile) = child(el, "elevationProfile") {
        for ev in children(profile, "elevation") {
            elevation.push(Elevation {
                s: attr_f64(ev, "s", &ctx)?,
                a: attr_f64(ev, "a", &ctx)?,
                b: attr_f64(ev, "b", &ctx)?,
                c: attr_f64(ev, "c", &ctx)?,
                d: attr_f64(ev, "d", &ctx)?,
            });
        }
        elevation.sort_by(|a, b| a.s.partial_cmp(&b.s).unwrap_or(std::cmp::Ordering::Equal));
    }

    let lanes_el = require_child(el, "lanes", &ctx)?;
    let mut sections = Vec::new();
    for section_el in children(lanes_el, "laneSection") {
        sections.push(parse_lane_section(section_el, &ctx)?);
    }
    sections.sort_by(|a, b| {
        a.s_start
            .partial_cmp(&b.s_start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut signals = Vec::new();
    if let Some(signals_el) = child(el, "signals") {
        for sig_el in children(signals_el, "signal") {
            signals.push(parse_signal(sig_el, id, &ctx)?);
        }
    }

    Ok((
        Road {
            id,
            name,
            length,
            junction,
            link,
            plan_view: geometry,
            elevation,
            sections,
        },
        signals,
    ))
}

fn parse_link_target(
    link_el: &Element,
    which: &str,
    ctx: &str,
) -> Result<Option<LinkTarget>, ParseError> {
    let el = match child(link_el, which) {
        Some(el) => el,
        None => return Ok(None),
    };
    let element_id = attr_i32(el, "elementId", ctx)?;
    match el.attr("elementType") {
        Some("junction") => Ok(Some(LinkTarget::Junction { id: element_id })),
        _ => {
            let contact = match el.attr("contactPoint") {
                Some("end") => ContactPoint::End,
                _ => ContactPoint::Start,
            };
            Ok(Some(LinkTarget::Road { id: element_id, contact }))
        }
    }
}

fn parse_geometry(el: &Element, road_id: RoadId, ctx: &str) -> Result<Geometry, ParseError> {
    let s = attr_f64(el, "s", ctx)?;
    let x = attr_f64(el, "x", ctx)?;
    let y = attr_f64(el, "y", ctx)?;
    let hdg = attr_f64(el, "hdg", ctx)?;
    let length = attr_f64(el, "length", ctx)?;
    let kind = if child(el, "arc").is_some() {
        let arc = child(el, "arc").unwrap();
        GeometryKind::Arc {
            curvature: attr_f64(arc, "curvature", ctx)?,
        }
    } else if child(el, "line").is_some() {
        GeometryKind::Line
    } else {
        let primitive = el
            .children()
            .next()
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| "?".to_string());
        warn!(
            "road {}: unsupported geometry primitive <{}> at s={}, treating as a line",
            road_id, primitive, s
        );
        GeometryKind::Line
    };
    Ok(Geometry { s, x, y, hdg, length, kind })
}

fn parse_lane_section(el: &Element, ctx: &str) -> Result<LaneSection, ParseError> {
    let s_start = attr_f64(el, "s", ctx)?;
    let mut lanes = BTreeMap::new();
    for side in &["left", "center", "right"] {
        if let Some(side_el) = child(el, side) {
            for lane_el in children(side_el, "lane") {
                let lane = parse_lane(lane_el, ctx)?;
                lanes.insert(lane.id, lane);
            }
        }
    }
    Ok(LaneSection { s_start, lanes })
}

fn parse_lane(el: &Element, ctx: &str) -> Result<Lane, ParseError> {
    let id = attr_i32(el, "id", ctx)?;
    let lane_type = el.attr("type").unwrap_or("driving").to_string();
    let mut widths = Vec::new();
    for width_el in children(el, "width") {
        widths.push(WidthRecord {
            s_offset: attr_f64(width_el, "sOffset", ctx)?,
            a: attr_f64(width_el, "a", ctx)?,
            b: attr_f64(width_el, "b", ctx)?,
            c: attr_f64(width_el, "c", ctx)?,
            d: attr_f64(width_el, "d", ctx)?,
        });
    }
    widths.sort_by(|a, b| {
        a.s_offset
            .partial_cmp(&b.s_offset)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(Lane { id, lane_type, widths })
}

fn parse_signal(el: &Element, road_id: RoadId, ctx: &str) -> Result<TrafficSignal, ParseError> {
    Ok(TrafficSignal {
        id: el.attr("id").unwrap_or("").to_string(),
        road_id,
        s: attr_f64(el, "s", ctx)?,
        t: el.attr("t").and_then(|t| t.parse().ok()).unwrap_or(0.0),
        orientation: match el.attr("orientation") {
            Some("-") => Orientation::Negative,
            _ => Orientation::Positive,
        },
        signal_type: el.attr("type").unwrap_or("").to_string(),
        subtype: el.attr("subtype").unwrap_or("").to_string(),
        dynamic: el.attr("dynamic") == Some("yes"),
    })
}

fn parse_junction(el: &Element) -> Result<Junction, ParseError> {
    let id: JunctionId = attr_i32(el, "id", "junction")?;
    let ctx = format!("junction {}", id);
    let name = el
        .attr("name")
        .map(|n| n.to_string())
        .unwrap_or_else(|| format!("junction{}", id));
    let mut connections = Vec::new();
    for conn_el in children(el, "connection") {
        let conn_id = conn_el
            .attr("id")
            .and_then(|v| v.parse().ok())
            .unwrap_or(connections.len() as u32);
        let mut lane_links = SmallVec::new();
        for link_el in children(conn_el, "laneLink") {
            lane_links.push((
                attr_i32(link_el, "from", &ctx)?,
                attr_i32(link_el, "to", &ctx)?,
            ));
        }
        connections.push(Connection {
            id: conn_id,
            incoming_road: attr_i32(conn_el, "incomingRoad", &ctx)?,
            connecting_road: attr_i32(conn_el, "connectingRoad", &ctx)?,
            contact: match conn_el.attr("contactPoint") {
                Some("end") => ContactPoint::End,
                _ => ContactPoint::Start,
            },
            lane_links,
        });
    }
    Ok(Junction { id, name, connections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::road::network::{GeometryKind, LinkTarget};

    const SAMPLE: &str = r#"
<OpenDRIVE>
  <road name="Main" length="100.0" id="1" junction="-1">
    <link>
      <successor elementType="junction" elementId="5"/>
    </link>
    <planView>
      <geometry s="0.0" x="0.0" y="0.0" hdg="0.0" length="60.0">
        <line/>
      </geometry>
      <geometry s="60.0" x="60.0" y="0.0" hdg="0.0" length="40.0">
        <arc curvature="0.01"/>
      </geometry>
    </planView>
    <elevationProfile>
      <elevation s="0.0" a="1.0" b="0.01" c="0.0" d="0.0"/>
    </elevationProfile>
    <lanes>
      <laneSection s="0.0">
        <left>
          <lane id="1" type="driving">
            <width sOffset="0.0" a="3.5" b="0.0" c="0.0" d="0.0"/>
          </lane>
        </left>
        <center>
          <lane id="0" type="none"/>
        </center>
        <right>
          <lane id="-1" type="driving">
            <width sOffset="0.0" a="3.5" b="0.0" c="0.0" d="0.0"/>
          </lane>
          <lane id="-2" type="sidewalk">
            <width sOffset="0.0" a="2.0" b="0.0" c="0.0" d="0.0"/>
          </lane>
        </right>
      </laneSection>
    </lanes>
    <signals>
      <signal id="42" s="80.0" t="-8.0" orientation="+" type="1000001" subtype="-1" dynamic="yes"/>
    </signals>
  </road>
  <road name="Conn" length="20.0" id="2" junction="5">
    <planView>
      <geometry s="0.0" x="100.0" y="0.0" hdg="0.0" length="20.0">
        <line/>
      </geometry>
    </planView>
    <lanes>
      <laneSection s="0.0">
        <right>
          <lane id="-1" type="driving">
            <width sOffset="0.0" a="3.5" b="0.0" c="0.0" d="0.0"/>
          </lane>
        </right>
      </laneSection>
    </lanes>
  </road>
  <junction id="5" name="X">
    <connection id="0" incomingRoad="1" connectingRoad="2" contactPoint="start">
      <laneLink from="-1" to="-1"/>
    </connection>
  </junction>
</OpenDRIVE>
"#;

    #[test]
    fn parses_sample_document() {
        let net = parse_opendrive(SAMPLE).unwrap();
        let road = net.get_road(1).unwrap();
        assert_eq!(road.name, "Main");
        assert!((road.length - 100.0).abs() < 1e-9);
        assert_eq!(road.junction, None);
        assert_eq!(road.plan_view.len(), 2);
        assert!(matches!(road.plan_view[1].kind, GeometryKind::Arc { .. }));
        assert_eq!(
            road.link.successor,
            Some(LinkTarget::Junction { id: 5 })
        );
        assert!((road.eval_elevation(10.0) - 1.1).abs() < 1e-9);

        assert_eq!(net.get_available_lanes(1, 50.0).unwrap(), vec![-2, -1, 1]);
        assert!(net.is_junction(2).unwrap());

        assert_eq!(net.signals().len(), 1);
        let sig = &net.signals()[0];
        assert_eq!(sig.id, "42");
        assert_eq!(sig.road_id, 1);
        assert!(sig.dynamic);

        let junction = net.get_junction(5).unwrap();
        assert_eq!(junction.connections.len(), 1);
        assert_eq!(junction.connections[0].lane_links.as_slice(), &[(-1, -1)]);
    }

    #[test]
    fn stop_line_derived_from_parsed_signal() {
        let net = parse_opendrive(SAMPLE).unwrap();
        // Only lane -1 is a driving lane facing the signal; the sidewalk
        // lane -2 gets no stop line.
        assert_eq!(net.stop_lines().len(), 1);
        let line = &net.stop_lines()[0];
        assert_eq!(line.lane_id, -1);
        assert!((line.s - 75.0).abs() < 1e-9);
    }

    #[test]
    fn missing_plan_view_is_an_error() {
        let xml = r#"<OpenDRIVE>
            <road name="r" length="10.0" id="1" junction="-1">
              <lanes><laneSection s="0.0"/></lanes>
            </road>
        </OpenDRIVE>"#;
        let err = parse_opendrive(xml).unwrap_err();
        assert!(matches!(err, ParseError::MissingElement { .. }));
    }

    #[test]
    fn bad_number_reports_attribute() {
        let xml = r#"<OpenDRIVE>
            <road name="r" length="ten" id="1" junction="-1">
              <planView><geometry s="0" x="0" y="0" hdg="0" length="10"><line/></geometry></planView>
              <lanes><laneSection s="0.0"/></lanes>
            </road>
        </OpenDRIVE>"#;
        match parse_opendrive(xml).unwrap_err() {
            ParseError::BadNumber { attribute, .. } => assert_eq!(attribute, "length"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn wrong_root_element_is_rejected() {
        assert!(matches!(
            parse_opendrive("<notOpenDrive/>").unwrap_err(),
            ParseError::MissingElement { .. }
        ));
    }

    #[test]
    fn dangling_junction_reference_is_a_model_error() {
        let xml = r#"<OpenDRIVE>
            <road name="r" length="10.0" id="1" junction="-1">
              <planView><geometry s="0" x="0" y="0" hdg="0" length="10"><line/></geometry></planView>
              <lanes><laneSection s="0.0"/></lanes>
            </road>
            <junction id="5" name="X">
              <connection id="0" incomingRoad="1" connectingRoad="99" contactPoint="start"/>
            </junction>
        </OpenDRIVE>"#;
        assert!(matches!(
            parse_opendrive(xml).unwrap_err(),
            ParseError::Model(_)
        ));
    }
}
