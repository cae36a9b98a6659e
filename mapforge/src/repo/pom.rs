//! Maven POM documents: building minimal descriptors and retargeting the
//! group of an existing one.

use crate::dependency::Coordinate;
use crate::error::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

const POM_NAMESPACE: &str = "http://maven.apache.org/POM/4.0.0";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const POM_SCHEMA: &str =
    "http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd";

fn pom_err(e: impl std::fmt::Display) -> Error {
    Error::Pom(e.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomDependency {
    pub coordinate: Coordinate,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomBuilder {
    group: String,
    artifact: String,
    version: String,
    description: Option<String>,
    dependencies: Vec<PomDependency>,
}

impl PomBuilder {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            description: None,
            dependencies: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds `group:name:version[:classifier]` with `scope`. An explicit
    /// `classifier` overrides one carried by the notation.
    pub fn dependency(&mut self, notation: &str, scope: &str, classifier: Option<&str>) -> Result<()> {
        let mut coordinate = Coordinate::parse(notation)
            .ok_or_else(|| Error::Pom(format!("invalid dependency notation '{}'", notation)))?;
        if let Some(classifier) = classifier {
            coordinate.classifier = Some(classifier.to_string());
        }
        self.dependencies.push(PomDependency {
            coordinate,
            scope: scope.to_string(),
        });
        Ok(())
    }

    pub fn dependencies(&self) -> &[PomDependency] {
        &self.dependencies
    }

    pub fn build(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(pom_err)?;

        let mut project = BytesStart::new("project");
        project.push_attribute(("xmlns", POM_NAMESPACE));
        project.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
        project.push_attribute(("xsi:schemaLocation", POM_SCHEMA));
        writer.write_event(Event::Start(project)).map_err(pom_err)?;

        text_element(&mut writer, "modelVersion", "4.0.0")?;
        text_element(&mut writer, "groupId", &self.group)?;
        text_element(&mut writer, "artifactId", &self.artifact)?;
        text_element(&mut writer, "version", &self.version)?;
        if let Some(description) = &self.description {
            text_element(&mut writer, "description", description)?;
        }

        if !self.dependencies.is_empty() {
            start(&mut writer, "dependencies")?;
            for dep in &self.dependencies {
                start(&mut writer, "dependency")?;
                text_element(&mut writer, "groupId", &dep.coordinate.group)?;
                text_element(&mut writer, "artifactId", &dep.coordinate.name)?;
                text_element(&mut writer, "version", &dep.coordinate.version)?;
                if let Some(classifier) = &dep.coordinate.classifier {
                    text_element(&mut writer, "classifier", classifier)?;
                }
                text_element(&mut writer, "scope", &dep.scope)?;
                end(&mut writer, "dependency")?;
            }
            end(&mut writer, "dependencies")?;
        }

        end(&mut writer, "project")?;
        String::from_utf8(writer.into_inner().into_inner()).map_err(pom_err)
    }
}

fn start(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(pom_err)
}

fn end(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(pom_err)
}

fn text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) -> Result<()> {
    start(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(pom_err)?;
    end(writer, name)
}

/// Replaces the project-level `<groupId>` of `pom` with `group`, adding one
/// when the project inherits its group from a parent. Every other element,
/// including dependency and parent coordinates, is copied unchanged.
pub fn rewrite_group_id(pom: &str, group: &str) -> Result<String> {
    let mut reader = Reader::from_str(pom);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut in_group = false;
    let mut replaced = false;

    loop {
        let event = reader.read_event().map_err(pom_err)?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) => {
                path.push(e.local_name().as_ref().to_vec());
                let at_group = is_project_group(&path);
                writer.write_event(event.borrow()).map_err(pom_err)?;
                if at_group {
                    writer
                        .write_event(Event::Text(BytesText::new(group)))
                        .map_err(pom_err)?;
                    in_group = true;
                    replaced = true;
                }
            }
            Event::Empty(ref e) => {
                path.push(e.local_name().as_ref().to_vec());
                if is_project_group(&path) {
                    text_element(&mut writer, "groupId", group)?;
                    replaced = true;
                } else {
                    writer.write_event(event.borrow()).map_err(pom_err)?;
                }
                path.pop();
            }
            Event::End(_) => {
                if path.len() == 1 && path[0] == b"project" && !replaced {
                    text_element(&mut writer, "groupId", group)?;
                    replaced = true;
                }
                in_group = false;
                path.pop();
                writer.write_event(event.borrow()).map_err(pom_err)?;
            }
            Event::Text(_) | Event::CData(_) if in_group => {}
            other => writer.write_event(other).map_err(pom_err)?,
        }
    }

    if !replaced {
        return Err(Error::Pom("document has no <project> element".to_string()));
    }
    String::from_utf8(writer.into_inner().into_inner()).map_err(pom_err)
}

fn is_project_group(path: &[Vec<u8>]) -> bool {
    path.len() == 2 && path[0] == b"project" && path[1] == b"groupId"
}
