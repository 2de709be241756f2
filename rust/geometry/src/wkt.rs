// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Well-Known-Text for plan polygons
//!
//! Reads and writes `POLYGON` and `MULTIPOLYGON` (2D; a Z ordinate is
//! accepted and dropped).

use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1, multispace0, multispace1, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::bool2d::{footprints_overlap, point_in_contour};
use crate::error::{Error, Result};
use crate::footprint::Footprint;
use crate::profile::Profile2D;
use nalgebra::Point2;
use std::fmt::Write;

/// Parse number: 12, -3.5, .25, 1e-3
fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            alt((
                recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

/// Parse coordinate: `x y` or `x y z`
fn coordinate(input: &str) -> IResult<&str, Point2<f64>> {
    map(
        tuple((
            number,
            preceded(multispace1, number),
            opt(preceded(multispace1, number)),
        )),
        |(x, y, _)| Point2::new(x, y),
    )(input)
}

/// Comma with optional surrounding whitespace
fn comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0)(input)
}

/// Parenthesised, comma separated list
fn parens<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<O>>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(
        terminated(char('('), multispace0),
        separated_list1(comma, inner),
        preceded(multispace0, char(')')),
    )
}

fn ring(input: &str) -> IResult<&str, Vec<Point2<f64>>> {
    parens(coordinate)(input)
}

fn polygon_body(input: &str) -> IResult<&str, Vec<Vec<Point2<f64>>>> {
    parens(ring)(input)
}

/// Keyword followed by an optional `Z` marker
fn keyword<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    value(
        (),
        tuple((
            tag_no_case(name),
            multispace0,
            opt(terminated(tag_no_case("Z"), multispace0)),
        )),
    )
}

fn empty(input: &str) -> IResult<&str, Vec<Vec<Vec<Point2<f64>>>>> {
    value(Vec::new(), tag_no_case("EMPTY"))(input)
}

fn geometry(input: &str) -> IResult<&str, Vec<Vec<Vec<Point2<f64>>>>> {
    alt((
        preceded(keyword("MULTIPOLYGON"), alt((empty, parens(polygon_body)))),
        preceded(
            keyword("POLYGON"),
            alt((empty, map(polygon_body, |p| vec![p]))),
        ),
    ))(input)
}

/// Drop the repeated closing point
fn open_ring(mut ring: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Parse `POLYGON` / `MULTIPOLYGON` text into a footprint
pub fn parse_wkt(text: &str) -> Result<Footprint> {
    let (_, polygons) = all_consuming(delimited(multispace0, geometry, multispace0))(text)
        .map_err(|e| Error::Wkt(format!("{e}")))?;

    let mut profiles = Vec::with_capacity(polygons.len());
    for rings in polygons {
        let mut rings = rings.into_iter().map(open_ring);
        let Some(outer) = rings.next() else {
            continue;
        };
        if outer.len() < 3 {
            return Err(Error::Wkt(format!(
                "ring with {} distinct points",
                outer.len()
            )));
        }
        profiles.push(Profile2D::with_holes(outer, rings.collect()).normalized());
    }
    Ok(Footprint::new(profiles))
}

fn write_ring(out: &mut String, ring: &[Point2<f64>]) {
    out.push('(');
    for (i, p) in ring.iter().chain(ring.first()).enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{} {}", p.x, p.y);
    }
    out.push(')');
}

fn write_polygon(out: &mut String, polygon: &Profile2D) {
    out.push('(');
    write_ring(out, &polygon.outer);
    for hole in &polygon.holes {
        out.push_str(", ");
        write_ring(out, hole);
    }
    out.push(')');
}

/// Render a footprint as WKT
pub fn write_footprint(footprint: &Footprint) -> String {
    let mut out = String::new();
    match footprint.polygons.as_slice() {
        [] => out.push_str("POLYGON EMPTY"),
        [single] => {
            out.push_str("POLYGON ");
            write_polygon(&mut out, single);
        }
        many => {
            out.push_str("MULTIPOLYGON (");
            for (i, polygon) in many.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_polygon(&mut out, polygon);
            }
            out.push(')');
        }
    }
    out
}

/// Area enclosed by a WKT polygon or multipolygon
pub fn area_from_wkt(text: &str) -> Result<f64> {
    Ok(parse_wkt(text)?.area())
}

/// Boundary length (outer rings and holes) of a WKT polygon or multipolygon
pub fn perimeter_from_wkt(text: &str) -> Result<f64> {
    Ok(parse_wkt(text)?.perimeter())
}

/// Whether two WKT geometries share any point (touching counts)
pub fn intersects_wkt(a: &str, b: &str) -> Result<bool> {
    let (a, b) = (parse_wkt(a)?, parse_wkt(b)?);
    Ok(footprints_intersect(&a, &b))
}

/// Closed-set intersection test between two footprints
pub fn footprints_intersect(a: &Footprint, b: &Footprint) -> bool {
    match (a.bounds(), b.bounds()) {
        (Some(ra), Some(rb)) if ra.intersects(&rb) => {}
        _ => return false,
    }
    if footprints_overlap(a, b) {
        return true;
    }

    let rings = |f: &Footprint| -> Vec<Vec<Point2<f64>>> {
        f.polygons
            .iter()
            .flat_map(|p| std::iter::once(p.outer.clone()).chain(p.holes.iter().cloned()))
            .collect()
    };
    let (rings_a, rings_b) = (rings(a), rings(b));

    let edges_touch = rings_a.iter().any(|ra| {
        rings_b.iter().any(|rb| {
            ring_edges(ra).any(|(p, q)| ring_edges(rb).any(|(r, s)| segments_touch(p, q, r, s)))
        })
    });
    if edges_touch {
        return true;
    }

    // One entirely inside the other without crossing edges
    let inside = |f: &Footprint, p: &Point2<f64>| {
        f.polygons.iter().any(|poly| {
            point_in_contour(p, &poly.outer) && !poly.holes.iter().any(|h| point_in_contour(p, h))
        })
    };
    a.polygons.iter().any(|p| p.outer.first().is_some_and(|v| inside(b, v)))
        || b.polygons.iter().any(|p| p.outer.first().is_some_and(|v| inside(a, v)))
}

fn ring_edges(ring: &[Point2<f64>]) -> impl Iterator<Item = (&Point2<f64>, &Point2<f64>)> {
    let n = ring.len();
    (0..n).map(move |i| (&ring[i], &ring[(i + 1) % n]))
}

fn orient(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(p: &Point2<f64>, q: &Point2<f64>, r: &Point2<f64>) -> bool {
    r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
}

/// Closed segment intersection (shared endpoints and collinear overlap count)
fn segments_touch(p: &Point2<f64>, q: &Point2<f64>, r: &Point2<f64>, s: &Point2<f64>) -> bool {
    let d1 = orient(r, s, p);
    let d2 = orient(r, s, q);
    let d3 = orient(p, q, r);
    let d4 = orient(p, q, s);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && on_segment(r, s, p))
        || (d2 == 0.0 && on_segment(r, s, q))
        || (d3 == 0.0 && on_segment(p, q, r))
        || (d4 == 0.0 && on_segment(p, q, s))
}
