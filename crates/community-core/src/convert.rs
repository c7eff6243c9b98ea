// ── API → domain conversions ──
//
// Wire types from `community-api` map onto the canonical model here.
// Empty image strings are treated the same as absent ones.

use community_api::types::{EmployeeResponse, ProposalResponse, ReviewResponse, ServiceResponse};

use crate::model::{Employee, ImageBlob, Proposal, Review, ServiceDetail};

fn image(raw: Option<String>) -> Option<ImageBlob> {
    raw.filter(|s| !s.is_empty()).map(ImageBlob::new)
}

impl From<ServiceResponse> for ServiceDetail {
    fn from(s: ServiceResponse) -> Self {
        Self {
            id: s.id,
            name: s.name,
            image: image(s.image),
            qualification: s.qualification,
            description: s.description,
            is_following: s.is_following,
        }
    }
}

impl From<EmployeeResponse> for Employee {
    fn from(e: EmployeeResponse) -> Self {
        Self {
            id: e.id,
            name: e.name,
            age: e.age,
            email: e.email,
            photo: image(e.photo),
        }
    }
}

impl From<ProposalResponse> for Proposal {
    fn from(p: ProposalResponse) -> Self {
        Self {
            id: p.id,
            create_date: p.create_date,
            name: p.name,
            written_by: p.written_by,
            status: p.status,
            description: p.description,
            close_date: p.close_date,
        }
    }
}

impl From<ReviewResponse> for Review {
    fn from(r: ReviewResponse) -> Self {
        Self {
            name: r.name,
            description: r.description,
            rating: r.rating,
            written_by: r.written_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_image_string_is_absent() {
        let detail = ServiceDetail::from(ServiceResponse {
            id: 1,
            name: "Bakery".into(),
            image: Some(String::new()),
            qualification: 3.5,
            description: None,
            is_following: false,
        });
        assert_eq!(detail.image, None);
    }

    #[test]
    fn employee_photo_is_kept_opaque() {
        let employee = Employee::from(EmployeeResponse {
            id: 7,
            name: "Ana".into(),
            age: Some(28),
            email: None,
            photo: Some("aGk=".into()),
        });
        assert_eq!(employee.photo.as_ref().map(ImageBlob::as_str), Some("aGk="));
    }
}
