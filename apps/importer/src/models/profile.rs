use serde::{Deserialize, Serialize};

/// The single schema every provider payload is normalized into.
///
/// Every collection is always serialized, as `[]` when there is no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalProfile {
    pub personal_info: PersonalInfo,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub skills: Vec<Skill>,
    pub certifications: Vec<Certification>,
    pub languages: Vec<Language>,
    pub projects: Vec<Project>,
    pub volunteer_experience: Vec<VolunteerExperience>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub full_name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub website: String,
    pub summary: String,
    pub profile_image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub position: String,
    pub company: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub current: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub field: String,
    pub start_date: String,
    pub end_date: String,
    pub grade: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    pub date: String,
    pub credential_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub name: String,
    pub proficiency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub description: String,
    pub url: String,
    pub start_date: String,
    pub end_date: String,
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerExperience {
    pub role: String,
    pub organization: String,
    pub cause: String,
    pub start_date: String,
    pub end_date: String,
    pub current: bool,
    pub description: String,
}

/// Top-level sections of a profile, used to describe which gaps a
/// supplementary provider can fill.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    PersonalInfo,
    Experience,
    Education,
    Skills,
    Certifications,
    Languages,
    Projects,
    VolunteerExperience,
}

impl CanonicalProfile {
    pub fn is_section_empty(&self, section: Section) -> bool {
        match section {
            Section::PersonalInfo => self.personal_info.is_empty(),
            Section::Experience => self.experience.is_empty(),
            Section::Education => self.education.is_empty(),
            Section::Skills => self.skills.is_empty(),
            Section::Certifications => self.certifications.is_empty(),
            Section::Languages => self.languages.is_empty(),
            Section::Projects => self.projects.is_empty(),
            Section::VolunteerExperience => self.volunteer_experience.is_empty(),
        }
    }

    /// Sections with no data, in declaration order.
    pub fn empty_sections(&self) -> Vec<Section> {
        [
            Section::PersonalInfo,
            Section::Experience,
            Section::Education,
            Section::Skills,
            Section::Certifications,
            Section::Languages,
            Section::Projects,
            Section::VolunteerExperience,
        ]
        .into_iter()
        .filter(|s| self.is_section_empty(*s))
        .collect()
    }
}

impl PersonalInfo {
    pub fn is_empty(&self) -> bool {
        [
            &self.full_name,
            &self.title,
            &self.email,
            &self.phone,
            &self.location,
            &self.linkedin,
            &self.website,
            &self.summary,
            &self.profile_image,
        ]
        .iter()
        .all(|v| v.is_empty())
    }
}
