//! Per-provider candidate lists. For every canonical field, the raw keys to
//! try in order; dotted keys descend into nested objects.

use crate::providers::ProviderId;

pub type Candidates = &'static [&'static str];

pub struct PersonalKeys {
    pub full_name: Candidates,
    /// `(first, last)` key pairs joined when no full name is present.
    pub name_parts: &'static [(&'static str, &'static str)],
    pub title: Candidates,
    pub email: Candidates,
    pub phone: Candidates,
    pub location: Candidates,
    pub linkedin: Candidates,
    /// Public handle, turned into a profile URL when `linkedin` is absent.
    pub handle: Candidates,
    pub website: Candidates,
    pub summary: Candidates,
    pub profile_image: Candidates,
}

pub struct ExperienceKeys {
    pub position: Candidates,
    pub company: Candidates,
    pub location: Candidates,
    pub start_date: Candidates,
    pub end_date: Candidates,
    /// Single "start - end" string, used when start/end are both absent.
    pub date_range: Candidates,
    pub current: Candidates,
    pub description: Candidates,
}

pub struct EducationKeys {
    pub institution: Candidates,
    pub degree: Candidates,
    pub field: Candidates,
    pub start_date: Candidates,
    pub end_date: Candidates,
    pub date_range: Candidates,
    pub grade: Candidates,
}

pub struct NamedKeys {
    pub name: Candidates,
    pub level: Candidates,
}

pub struct CertificationKeys {
    pub name: Candidates,
    pub issuer: Candidates,
    pub date: Candidates,
    pub credential_id: Candidates,
    pub url: Candidates,
}

pub struct ProjectKeys {
    pub name: Candidates,
    pub description: Candidates,
    pub url: Candidates,
    pub start_date: Candidates,
    pub end_date: Candidates,
    pub technologies: Candidates,
}

pub struct ProviderMapping {
    pub personal: PersonalKeys,
    pub experience: Candidates,
    pub experience_keys: ExperienceKeys,
    pub education: Candidates,
    pub education_keys: EducationKeys,
    pub skills: Candidates,
    pub skill_keys: NamedKeys,
    pub certifications: Candidates,
    /// Sections some providers keep apart (awards, honors); appended to certifications.
    pub extra_certifications: Candidates,
    pub certification_keys: CertificationKeys,
    pub languages: Candidates,
    pub language_keys: NamedKeys,
    pub projects: Candidates,
    pub project_keys: ProjectKeys,
    pub volunteer: Candidates,
    /// Volunteer entries share the experience shape: role, organization, dates, description.
    pub volunteer_keys: ExperienceKeys,
    pub volunteer_cause: Candidates,
    /// Derive skills from summary and experience text when the payload lists none.
    pub infer_skills: bool,
}

/// Technologies recognised in free text when a payload has no skills section.
pub const INFERABLE_SKILLS: &[&str] = &[
    "JavaScript", "TypeScript", "Java", "Python", "Rust", "React", "Node.js", "Next.js",
    "HTML", "CSS", "SQL", "MongoDB", "PostgreSQL", "Docker", "AWS", "Azure", "Git", "Linux",
    "Testing", "Automation", "Agile", "Scrum", "REST API", "GraphQL", "Spring Boot", "Angular",
    "Vue.js", "Express.js", "Kubernetes", "CI/CD", "Machine Learning", "AI", "Data Science",
    "DevOps", "Microservices",
];

pub fn mapping_for(provider: ProviderId) -> &'static ProviderMapping {
    match provider {
        ProviderId::BrightData => &BRIGHTDATA,
        ProviderId::ScrapingDog => &SCRAPINGDOG,
        ProviderId::RapidApi => &RAPIDAPI,
    }
}

const PROJECT_KEYS: ProjectKeys = ProjectKeys {
    name: &["name", "title"],
    description: &["description", "summary"],
    url: &["url", "link"],
    start_date: &["start_date", "startDate", "starts_at"],
    end_date: &["end_date", "endDate", "ends_at"],
    technologies: &["technologies", "skills"],
};

static BRIGHTDATA: ProviderMapping = ProviderMapping {
    personal: PersonalKeys {
        full_name: &["name", "full_name"],
        name_parts: &[("first_name", "last_name")],
        title: &["headline", "title", "position"],
        email: &["email", "contact_info.email"],
        phone: &["phone", "contact_info.phone"],
        location: &["location", "geo_location", "city"],
        linkedin: &["url", "input_url"],
        handle: &["linkedin_id"],
        website: &["website", "contact_info.website"],
        summary: &["summary", "about"],
        profile_image: &["avatar", "image_url", "profile_image"],
    },
    experience: &["experience"],
    experience_keys: ExperienceKeys {
        position: &["title", "position", "job_title"],
        company: &["company", "company_name", "organization"],
        location: &["location"],
        start_date: &["start_date", "startDate", "from"],
        end_date: &["end_date", "endDate", "to"],
        date_range: &["date_range", "duration"],
        current: &["current", "is_current"],
        description: &["description", "summary"],
    },
    education: &["educations_details", "education"],
    education_keys: EducationKeys {
        institution: &["school", "institution", "university", "title"],
        degree: &["degree", "qualification"],
        field: &["field", "field_of_study"],
        start_date: &["start_date", "startDate", "from", "start_year"],
        end_date: &["end_date", "endDate", "to", "end_year"],
        date_range: &["date_range"],
        grade: &["gpa", "grade"],
    },
    skills: &["skills"],
    skill_keys: NamedKeys {
        name: &["name", "skill", "title"],
        level: &["level", "proficiency"],
    },
    certifications: &["certifications"],
    extra_certifications: &["honors_and_awards"],
    certification_keys: CertificationKeys {
        name: &["name", "title"],
        issuer: &["issuer", "organization", "authority", "subtitle"],
        date: &["date", "issue_date", "issued_date"],
        credential_id: &["credential_id"],
        url: &["url", "credential_url", "link"],
    },
    languages: &["languages"],
    language_keys: NamedKeys {
        name: &["name", "language", "title"],
        level: &["proficiency", "level", "subtitle"],
    },
    projects: &["projects"],
    project_keys: PROJECT_KEYS,
    volunteer: &["volunteering", "volunteer_experience"],
    volunteer_keys: ExperienceKeys {
        position: &["role", "position", "title"],
        company: &["organization", "company"],
        location: &["location"],
        start_date: &["start_date", "startDate"],
        end_date: &["end_date", "endDate"],
        date_range: &["duration"],
        current: &["current"],
        description: &["description", "summary"],
    },
    volunteer_cause: &["cause", "field"],
    infer_skills: false,
};

static SCRAPINGDOG: ProviderMapping = ProviderMapping {
    personal: PersonalKeys {
        full_name: &["fullName", "name"],
        name_parts: &[("first_name", "last_name")],
        title: &["headline"],
        email: &["email"],
        phone: &["phone"],
        location: &["location"],
        linkedin: &["public_profile_url"],
        handle: &["public_identifier"],
        website: &["website"],
        summary: &["about"],
        profile_image: &["profile_photo", "profileImage"],
    },
    experience: &["experience"],
    experience_keys: ExperienceKeys {
        position: &["position", "title"],
        company: &["company_name", "company"],
        location: &["location"],
        start_date: &["starts_at", "start_date"],
        end_date: &["ends_at", "end_date"],
        date_range: &["duration"],
        current: &[],
        description: &["summary", "description"],
    },
    education: &["education"],
    education_keys: EducationKeys {
        institution: &["college_name", "school", "institution"],
        degree: &["college_degree", "degree"],
        field: &["college_degree_field", "field_of_study"],
        start_date: &["starts_at", "start_date"],
        end_date: &["ends_at", "end_date"],
        date_range: &["college_duration", "duration", "date_range"],
        grade: &["grade", "gpa"],
    },
    skills: &["skills"],
    skill_keys: NamedKeys {
        name: &["name", "skill"],
        level: &["level", "proficiency"],
    },
    certifications: &["certification", "certifications"],
    extra_certifications: &["awards"],
    certification_keys: CertificationKeys {
        name: &["name", "title"],
        issuer: &["organization", "authority", "issuer"],
        date: &["duration", "date", "issued_date"],
        credential_id: &["credential_id"],
        url: &["url", "link", "credential_url"],
    },
    languages: &["languages"],
    language_keys: NamedKeys {
        name: &["name", "language"],
        level: &["proficiency", "level"],
    },
    projects: &["projects"],
    project_keys: ProjectKeys {
        name: &["title", "name"],
        description: &["summary", "description"],
        ..PROJECT_KEYS
    },
    volunteer: &["volunteering", "volunteer_experience"],
    volunteer_keys: ExperienceKeys {
        position: &["role", "position", "title"],
        company: &["organization", "company", "company_name"],
        location: &["location"],
        start_date: &["starts_at", "start_date"],
        end_date: &["ends_at", "end_date"],
        date_range: &["duration"],
        current: &[],
        description: &["summary", "description"],
    },
    volunteer_cause: &["cause", "field"],
    infer_skills: true,
};

static RAPIDAPI: ProviderMapping = ProviderMapping {
    personal: PersonalKeys {
        full_name: &["full_name", "name", "displayName"],
        name_parts: &[("first_name", "last_name"), ("firstName", "lastName")],
        title: &["headline", "job_title"],
        email: &["email"],
        phone: &["phone"],
        location: &["location", "city"],
        linkedin: &["linkedin_url", "profile_url"],
        handle: &["public_id"],
        website: &["website"],
        summary: &["about", "summary"],
        profile_image: &["profile_image_url", "profile_picture"],
    },
    experience: &["experiences", "experience", "work_history", "positions"],
    experience_keys: ExperienceKeys {
        position: &["title", "position"],
        company: &["company", "company_name"],
        location: &["location"],
        start_date: &["start_date", "starts_at", "start_year"],
        end_date: &["end_date", "ends_at", "end_year"],
        date_range: &["date_range"],
        current: &["is_current", "current"],
        description: &["description"],
    },
    education: &["educations", "education"],
    education_keys: EducationKeys {
        institution: &["school", "institution"],
        degree: &["degree"],
        field: &["field_of_study", "field"],
        start_date: &["start_date", "start_year"],
        end_date: &["end_date", "end_year"],
        date_range: &["date_range"],
        grade: &["grade"],
    },
    skills: &["skills", "skill_set"],
    skill_keys: NamedKeys {
        name: &["name", "skill"],
        level: &["level", "proficiency"],
    },
    certifications: &["certifications", "certificates"],
    extra_certifications: &[],
    certification_keys: CertificationKeys {
        name: &["name", "title"],
        issuer: &["authority", "issuer", "organization"],
        date: &["issued_date", "date"],
        credential_id: &["credential_id"],
        url: &["url", "credential_url"],
    },
    languages: &["languages"],
    language_keys: NamedKeys {
        name: &["name", "language"],
        level: &["proficiency", "level"],
    },
    projects: &["projects"],
    project_keys: PROJECT_KEYS,
    volunteer: &["volunteers", "volunteer_experience", "volunteering"],
    volunteer_keys: ExperienceKeys {
        position: &["role", "title"],
        company: &["organization", "company"],
        location: &["location"],
        start_date: &["start_date", "start_year"],
        end_date: &["end_date", "end_year"],
        date_range: &["date_range"],
        current: &["is_current", "current"],
        description: &["description"],
    },
    volunteer_cause: &["cause"],
    infer_skills: false,
};
