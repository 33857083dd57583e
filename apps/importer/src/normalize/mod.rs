//! Maps provider payloads into [`CanonicalProfile`].
//!
//! Mapping is table driven (see [`fields`]): for each canonical field the
//! first present, non-null, non-blank candidate wins. Values that exist but
//! cannot be mapped leave the field at its default and produce a
//! [`NormalizationWarning`]; they never fail the import.

pub mod dates;
pub mod fields;

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::profile::{
    CanonicalProfile, Certification, Education, Experience, Language, PersonalInfo, Project,
    Skill, VolunteerExperience,
};
use crate::providers::RawPayload;
use dates::{format_date, is_open_ended, split_range};
use fields::{
    mapping_for, CertificationKeys, INFERABLE_SKILLS, EducationKeys, ExperienceKeys, NamedKeys,
    PersonalKeys, ProjectKeys,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizationWarning {
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub profile: CanonicalProfile,
    pub warnings: Vec<NormalizationWarning>,
}

/// Pure: the same payload always yields the same profile and warnings.
pub fn normalize(payload: &RawPayload) -> Normalized {
    let mapping = mapping_for(payload.provider());
    let raw = payload.record().fields();
    let mut m = Mapper::default();

    let personal_info = m.personal(raw, &mapping.personal);
    let experience = m.collect(raw, mapping.experience, "experience", false, |m, item, path| {
        m.role(item, &mapping.experience_keys, path).map(Role::into_experience)
    });
    let education = m.collect(raw, mapping.education, "education", false, |m, item, path| {
        m.education(item, &mapping.education_keys, path)
    });
    let mut skills = dedupe_skills(m.collect(raw, mapping.skills, "skills", true, |m, item, path| {
        m.named(item, &mapping.skill_keys, path)
            .map(|(name, level)| Skill { name, level })
    }));
    if skills.is_empty() && mapping.infer_skills {
        skills = infer_skills(&personal_info.summary, &experience);
        if !skills.is_empty() {
            m.warn("skills", "inferred from summary and experience text");
        }
    }

    let mut certifications = m.collect(
        raw,
        mapping.certifications,
        "certifications",
        false,
        |m, item, path| m.certification(item, &mapping.certification_keys, path),
    );
    if !mapping.extra_certifications.is_empty() {
        certifications.extend(m.collect(
            raw,
            mapping.extra_certifications,
            "certifications.awards",
            false,
            |m, item, path| m.certification(item, &mapping.certification_keys, path),
        ));
    }

    let languages = m.collect(raw, mapping.languages, "languages", true, |m, item, path| {
        m.named(item, &mapping.language_keys, path)
            .map(|(name, proficiency)| Language { name, proficiency })
    });
    let projects = m.collect(raw, mapping.projects, "projects", false, |m, item, path| {
        m.project(item, &mapping.project_keys, path)
    });
    let volunteer_experience = m.collect(
        raw,
        mapping.volunteer,
        "volunteerExperience",
        false,
        |m, item, path| {
            let obj = item.as_object()?;
            let cause = m.text(obj, mapping.volunteer_cause, &format!("{path}.cause"));
            m.role(item, &mapping.volunteer_keys, path)
                .map(|role| role.into_volunteer(cause))
        },
    );

    Normalized {
        profile: CanonicalProfile {
            personal_info,
            experience,
            education,
            skills,
            certifications,
            languages,
            projects,
            volunteer_experience,
        },
        warnings: m.warnings,
    }
}

/// Fills fields that are empty in `primary` from `secondary`. Non-empty
/// primary data is never overwritten.
pub fn merge_supplementary(mut primary: CanonicalProfile, secondary: &CanonicalProfile) -> CanonicalProfile {
    let p = &mut primary.personal_info;
    let s = &secondary.personal_info;
    for (target, source) in [
        (&mut p.full_name, &s.full_name),
        (&mut p.title, &s.title),
        (&mut p.email, &s.email),
        (&mut p.phone, &s.phone),
        (&mut p.location, &s.location),
        (&mut p.linkedin, &s.linkedin),
        (&mut p.website, &s.website),
        (&mut p.summary, &s.summary),
        (&mut p.profile_image, &s.profile_image),
    ] {
        if target.is_empty() && !source.is_empty() {
            target.clone_from(source);
        }
    }

    fill_if_empty(&mut primary.experience, &secondary.experience);
    fill_if_empty(&mut primary.education, &secondary.education);
    fill_if_empty(&mut primary.skills, &secondary.skills);
    fill_if_empty(&mut primary.certifications, &secondary.certifications);
    fill_if_empty(&mut primary.languages, &secondary.languages);
    fill_if_empty(&mut primary.projects, &secondary.projects);
    fill_if_empty(&mut primary.volunteer_experience, &secondary.volunteer_experience);
    primary
}

fn fill_if_empty<T: Clone>(target: &mut Vec<T>, source: &[T]) {
    if target.is_empty() {
        target.extend_from_slice(source);
    }
}

fn dedupe_skills(skills: Vec<Skill>) -> Vec<Skill> {
    let mut seen = HashSet::new();
    skills
        .into_iter()
        .filter(|s| seen.insert(s.name.to_lowercase()))
        .collect()
}

/// Known technologies mentioned as whole words in the summary or any role description.
fn infer_skills(summary: &str, experience: &[Experience]) -> Vec<Skill> {
    let text = std::iter::once(summary)
        .chain(experience.iter().map(|e| e.description.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();
    INFERABLE_SKILLS
        .iter()
        .filter(|skill| mentions(&text, &skill.to_lowercase()))
        .map(|skill| Skill {
            name: skill.to_string(),
            level: String::new(),
        })
        .collect()
}

fn mentions(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + term.len()..].chars().next();
        !before.into_iter().chain(after).any(char::is_alphanumeric)
    })
}

fn lookup<'v>(obj: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    let mut parts = path.split('.');
    let mut current = obj.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Role-shaped entry shared by experience and volunteer sections.
struct Role {
    position: String,
    company: String,
    location: String,
    start_date: String,
    end_date: String,
    current: bool,
    description: String,
}

impl Role {
    fn into_experience(self) -> Experience {
        Experience {
            position: self.position,
            company: self.company,
            location: self.location,
            start_date: self.start_date,
            end_date: self.end_date,
            current: self.current,
            description: self.description,
        }
    }

    fn into_volunteer(self, cause: String) -> VolunteerExperience {
        VolunteerExperience {
            role: self.position,
            organization: self.company,
            cause,
            start_date: self.start_date,
            end_date: self.end_date,
            current: self.current,
            description: self.description,
        }
    }
}

#[derive(Default)]
struct Mapper {
    warnings: Vec<NormalizationWarning>,
}

impl Mapper {
    fn warn(&mut self, field: &str, reason: impl Into<String>) {
        self.warnings.push(NormalizationWarning {
            field: field.to_string(),
            reason: reason.into(),
        });
    }

    fn text(&mut self, obj: &Map<String, Value>, keys: &[&str], field: &str) -> String {
        let mut rejected: Option<(&str, &'static str)> = None;
        for key in keys {
            match lookup(obj, key) {
                None => {}
                Some(v) if is_blank(v) => {}
                Some(Value::String(s)) => return s.trim().to_string(),
                Some(Value::Number(n)) => return n.to_string(),
                Some(other) => {
                    rejected.get_or_insert((*key, kind_of(other)));
                }
            }
        }
        if let Some((key, kind)) = rejected {
            self.warn(field, format!("`{key}` is {kind}, expected text"));
        }
        String::new()
    }

    fn date(&mut self, obj: &Map<String, Value>, keys: &[&str], field: &str) -> String {
        let mut rejected: Option<(&str, String)> = None;
        for key in keys {
            let Some(value) = lookup(obj, key) else {
                continue;
            };
            match format_date(value) {
                Ok(Some(date)) => return date,
                Ok(None) => {}
                Err(reason) => {
                    rejected.get_or_insert((*key, reason));
                }
            }
        }
        if let Some((key, reason)) = rejected {
            self.warn(field, format!("`{key}`: {reason}"));
        }
        String::new()
    }

    fn flag(&self, obj: &Map<String, Value>, keys: &[&str]) -> bool {
        keys.iter()
            .find_map(|key| match lookup(obj, key)? {
                Value::Bool(b) => Some(*b),
                Value::String(s) => s.trim().parse::<bool>().ok(),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Items of the first candidate holding a list. With `delimited`, a plain
    /// string is also accepted and split on `|` or `,`.
    fn section(
        &mut self,
        obj: &Map<String, Value>,
        keys: &[&str],
        field: &str,
        delimited: bool,
    ) -> Vec<Value> {
        let mut rejected: Option<(&str, &'static str)> = None;
        for key in keys {
            match lookup(obj, key) {
                None => {}
                Some(v) if is_blank(v) => {}
                Some(Value::Array(items)) => return items.clone(),
                Some(Value::String(s)) if delimited => {
                    let sep = if s.contains('|') { '|' } else { ',' };
                    return s
                        .split(sep)
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(|part| Value::String(part.to_string()))
                        .collect();
                }
                Some(other) => {
                    rejected.get_or_insert((*key, kind_of(other)));
                }
            }
        }
        if let Some((key, kind)) = rejected {
            self.warn(field, format!("`{key}` is {kind}, expected a list"));
        }
        Vec::new()
    }

    fn collect<T>(
        &mut self,
        obj: &Map<String, Value>,
        keys: &[&str],
        field: &str,
        delimited: bool,
        mut map: impl FnMut(&mut Self, &Value, &str) -> Option<T>,
    ) -> Vec<T> {
        self.section(obj, keys, field, delimited)
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let path = format!("{field}[{i}]");
                if !item.is_object() && !(delimited && item.is_string()) {
                    self.warn(&path, format!("entry is {}, expected an object", kind_of(&item)));
                    return None;
                }
                map(self, &item, &path)
            })
            .collect()
    }

    fn personal(&mut self, raw: &Map<String, Value>, keys: &PersonalKeys) -> PersonalInfo {
        let mut full_name = self.text(raw, keys.full_name, "personalInfo.fullName");
        if full_name.is_empty() {
            full_name = keys
                .name_parts
                .iter()
                .map(|(first, last)| {
                    let first = self.text(raw, &[*first], "personalInfo.fullName");
                    let last = self.text(raw, &[*last], "personalInfo.fullName");
                    format!("{first} {last}").trim().to_string()
                })
                .find(|name| !name.is_empty())
                .unwrap_or_default();
        }

        let mut linkedin = self.text(raw, keys.linkedin, "personalInfo.linkedin");
        if linkedin.is_empty() {
            let handle = self.text(raw, keys.handle, "personalInfo.linkedin");
            if !handle.is_empty() {
                linkedin = format!("https://www.linkedin.com/in/{handle}");
            }
        }

        PersonalInfo {
            full_name,
            title: self.text(raw, keys.title, "personalInfo.title"),
            email: self.text(raw, keys.email, "personalInfo.email"),
            phone: self.text(raw, keys.phone, "personalInfo.phone"),
            location: self.text(raw, keys.location, "personalInfo.location"),
            linkedin,
            website: self.text(raw, keys.website, "personalInfo.website"),
            summary: self.text(raw, keys.summary, "personalInfo.summary"),
            profile_image: self.text(raw, keys.profile_image, "personalInfo.profileImage"),
        }
    }

    /// Start/end dates, falling back to a single range string.
    fn dates(
        &mut self,
        obj: &Map<String, Value>,
        start_keys: &[&str],
        end_keys: &[&str],
        range_keys: &[&str],
        path: &str,
    ) -> (String, String, bool) {
        let start = self.date(obj, start_keys, &format!("{path}.startDate"));
        let end = self.date(obj, end_keys, &format!("{path}.endDate"));
        if is_open_ended(&end) {
            return (start, String::new(), true);
        }
        if !start.is_empty() || !end.is_empty() {
            return (start, end, false);
        }

        let range = self.text(obj, range_keys, &format!("{path}.dateRange"));
        if range.is_empty() {
            return (String::new(), String::new(), false);
        }
        match split_range(&range) {
            Some(r) => (r.start, r.end, r.current),
            None => {
                self.warn(
                    &format!("{path}.dateRange"),
                    format!("unrecognised date range `{range}`"),
                );
                (String::new(), String::new(), false)
            }
        }
    }

    fn role(&mut self, item: &Value, keys: &ExperienceKeys, path: &str) -> Option<Role> {
        let obj = item.as_object()?;
        let position = self.text(obj, keys.position, &format!("{path}.position"));
        let company = self.text(obj, keys.company, &format!("{path}.company"));
        if position.is_empty() && company.is_empty() {
            self.warn(path, "entry has neither a position nor an organization; dropped");
            return None;
        }

        let (start_date, end_date, open_ended) = self.dates(
            obj,
            keys.start_date,
            keys.end_date,
            keys.date_range,
            path,
        );
        Some(Role {
            position,
            company,
            location: self.text(obj, keys.location, &format!("{path}.location")),
            start_date,
            end_date,
            current: open_ended || self.flag(obj, keys.current),
            description: self.text(obj, keys.description, &format!("{path}.description")),
        })
    }

    fn education(&mut self, item: &Value, keys: &EducationKeys, path: &str) -> Option<Education> {
        let obj = item.as_object()?;
        let institution = self.text(obj, keys.institution, &format!("{path}.institution"));
        let degree = self.text(obj, keys.degree, &format!("{path}.degree"));
        if institution.is_empty() && degree.is_empty() {
            self.warn(path, "entry has neither an institution nor a degree; dropped");
            return None;
        }

        let (start_date, end_date, _) =
            self.dates(obj, keys.start_date, keys.end_date, keys.date_range, path);
        Some(Education {
            institution,
            degree,
            field: self.text(obj, keys.field, &format!("{path}.field")),
            start_date,
            end_date,
            grade: self.text(obj, keys.grade, &format!("{path}.grade")),
        })
    }

    /// Skills and languages: a bare string or an object with a name and a level.
    fn named(&mut self, item: &Value, keys: &NamedKeys, path: &str) -> Option<(String, String)> {
        let (name, level) = match item {
            Value::String(s) => (s.trim().to_string(), String::new()),
            Value::Object(obj) => (
                self.text(obj, keys.name, &format!("{path}.name")),
                self.text(obj, keys.level, &format!("{path}.level")),
            ),
            _ => (String::new(), String::new()),
        };
        if name.is_empty() {
            self.warn(path, "entry has no name; dropped");
            return None;
        }
        Some((name, level))
    }

    fn certification(
        &mut self,
        item: &Value,
        keys: &CertificationKeys,
        path: &str,
    ) -> Option<Certification> {
        let obj = item.as_object()?;
        let name = self.text(obj, keys.name, &format!("{path}.name"));
        if name.is_empty() {
            self.warn(path, "entry has no name; dropped");
            return None;
        }
        Some(Certification {
            name,
            issuer: self.text(obj, keys.issuer, &format!("{path}.issuer")),
            date: self.date(obj, keys.date, &format!("{path}.date")),
            credential_id: self.text(obj, keys.credential_id, &format!("{path}.credentialId")),
            url: self.text(obj, keys.url, &format!("{path}.url")),
        })
    }

    fn project(&mut self, item: &Value, keys: &ProjectKeys, path: &str) -> Option<Project> {
        let obj = item.as_object()?;
        let name = self.text(obj, keys.name, &format!("{path}.name"));
        if name.is_empty() {
            self.warn(path, "entry has no name; dropped");
            return None;
        }
        let technologies = self
            .section(obj, keys.technologies, &format!("{path}.technologies"), true)
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Object(o) => o
                    .get("name")
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                _ => None,
            })
            .collect();
        Some(Project {
            name,
            description: self.text(obj, keys.description, &format!("{path}.description")),
            url: self.text(obj, keys.url, &format!("{path}.url")),
            start_date: self.date(obj, keys.start_date, &format!("{path}.startDate")),
            end_date: self.date(obj, keys.end_date, &format!("{path}.endDate")),
            technologies,
        })
    }
}
