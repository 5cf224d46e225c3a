//! Monthly ISLR withholding relation (SENIAT XML).

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::DomainError;
use crate::domain::retention::{PAYROLL_ISLR_CODE, islr_concept};
use crate::model::purchase::Purchase;
use crate::utils::rif::compact;
use crate::utils::text::{decimal_dot, xml_escape};

#[derive(Debug, Clone, PartialEq)]
pub struct IslrDetail {
    pub rif_retenido: String,
    pub numero_factura: String,
    pub numero_control: String,
    pub fecha_operacion: NaiveDate,
    pub codigo_concepto: String,
    pub monto_operacion: Decimal,
    /// Percentage, e.g. `2.00` for 2 %
    pub porcentaje: Decimal,
}

impl IslrDetail {
    /// Supplier withholding on the same base it was computed on, exempt
    /// amount included. `None` when the purchase carries no ISLR concept.
    pub fn purchase(purchase: &Purchase) -> Result<Option<Self>, DomainError> {
        let Some(code) = purchase.islr_concept.as_deref() else {
            return Ok(None);
        };
        let concept = islr_concept(code)?;
        Ok(Some(IslrDetail {
            rif_retenido: purchase.supplier_rif.clone(),
            numero_factura: purchase.invoice_number.clone(),
            numero_control: purchase.control_number.clone(),
            fecha_operacion: purchase.invoice_date,
            codigo_concepto: concept.code.to_string(),
            monto_operacion: purchase.base + purchase.exento,
            porcentaje: concept.rate * Decimal::ONE_HUNDRED,
        }))
    }

    /// Salary withholding: invoice and control numbers are always `0`.
    pub fn payroll(national_id: &str, paid_on: NaiveDate, gross: Decimal, rate: Decimal) -> Self {
        IslrDetail {
            rif_retenido: national_id.to_string(),
            numero_factura: "0".into(),
            numero_control: "0".into(),
            fecha_operacion: paid_on,
            codigo_concepto: PAYROLL_ISLR_CODE.into(),
            monto_operacion: gross,
            porcentaje: rate * Decimal::ONE_HUNDRED,
        }
    }
}

fn element(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!("    <{name}>{}</{name}>\n", xml_escape(value)));
}

pub fn islr_xml(agent_rif: &str, period: &str, details: &[IslrDetail]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<RelacionRetencionesISLR RifAgente=\"{}\" Periodo=\"{}\">\n",
        xml_escape(&compact(agent_rif)),
        xml_escape(period)
    ));

    for d in details {
        out.push_str("  <DetalleRetencion>\n");
        element(&mut out, "RifRetenido", &compact(&d.rif_retenido));
        element(&mut out, "NumeroFactura", &d.numero_factura);
        element(&mut out, "NumeroControl", &d.numero_control);
        element(&mut out, "FechaOperacion", &d.fecha_operacion.format("%d/%m/%Y").to_string());
        element(&mut out, "CodigoConcepto", &d.codigo_concepto);
        element(&mut out, "MontoOperacion", &decimal_dot(d.monto_operacion));
        element(&mut out, "PorcentajeRetencion", &decimal_dot(d.porcentaje));
        out.push_str("  </DetalleRetencion>\n");
    }

    out.push_str("</RelacionRetencionesISLR>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retention::islr_retention;
    use crate::domain::round2;
    use crate::fiscal::books::fixtures::purchase;
    use rust_decimal_macros::dec;

    #[test]
    fn purchase_detail_reports_the_withheld_base() {
        let mut p = purchase(5, "A-77");
        p.exento = dec!(250);
        let detail = IslrDetail::purchase(&p).unwrap().unwrap();
        assert_eq!(detail.monto_operacion, dec!(1250));
        assert_eq!(detail.codigo_concepto, "053");
        assert_eq!(
            round2(detail.monto_operacion * detail.porcentaje / Decimal::ONE_HUNDRED),
            islr_retention(p.base + p.exento, islr_concept("053").unwrap())
        );

        p.islr_concept = None;
        assert_eq!(IslrDetail::purchase(&p).unwrap(), None);
        p.islr_concept = Some("999".into());
        assert!(IslrDetail::purchase(&p).is_err());
    }

    #[test]
    fn renders_purchase_and_payroll_details() {
        let purchase = IslrDetail {
            rif_retenido: "J-30000000-1".into(),
            numero_factura: "A&B-1".into(),
            numero_control: "00-1".into(),
            fecha_operacion: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            codigo_concepto: "053".into(),
            monto_operacion: dec!(1000),
            porcentaje: dec!(2),
        };
        let payroll = IslrDetail::payroll(
            "V12345678",
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            dec!(1500),
            dec!(0.03),
        );

        let xml = islr_xml("J-00000000-0", "202601", &[purchase, payroll]);

        assert!(xml.contains("<RelacionRetencionesISLR RifAgente=\"J000000000\" Periodo=\"202601\">"));
        assert!(xml.contains("<NumeroFactura>A&amp;B-1</NumeroFactura>"));
        assert!(xml.contains("<FechaOperacion>05/01/2026</FechaOperacion>"));
        assert!(xml.contains("<CodigoConcepto>001</CodigoConcepto>"));
        assert!(xml.contains("<PorcentajeRetencion>3.00</PorcentajeRetencion>"));
        assert_eq!(xml.matches("<DetalleRetencion>").count(), 2);
        assert!(xml.ends_with("</RelacionRetencionesISLR>\n"));
    }
}
